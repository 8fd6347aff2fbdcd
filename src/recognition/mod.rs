pub mod alphabet;
pub mod calibration;
pub mod ctc;
pub mod decode;
pub mod edit_distance;
pub mod evaluation;
pub mod stats;
