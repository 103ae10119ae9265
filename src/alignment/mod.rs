pub mod matcher;
pub mod normalize;
pub mod report;
pub mod timeline;
