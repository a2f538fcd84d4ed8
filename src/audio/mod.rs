pub mod analysis;
pub mod averaging;
pub mod decode;
pub mod header;
