pub mod composer;
pub mod normalize;
pub mod projection;
