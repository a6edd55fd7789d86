pub mod loader;
pub mod preprocessing;
pub mod raw;
pub mod transforms;

pub use loader::ImageLoader;
pub use preprocessing::{ImagePreprocessor, InputTensor};
pub use raw::RawImage;
pub use transforms::{ImageTransforms, ResizePolicy};
