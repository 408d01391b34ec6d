//! Domain entity definitions.

mod device_image;
mod resource;

pub use device_image::{
    CacheKey, DeviceId, DeviceImageRef, ImageState, ImageStatus, TenantKey, UNSCOPED_TENANT_LABEL,
};
pub use resource::ResourceHandle;
