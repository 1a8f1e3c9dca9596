pub mod ela;
pub mod fingerprint;
pub mod lsb;
pub mod perceptual;
pub mod statistics;
