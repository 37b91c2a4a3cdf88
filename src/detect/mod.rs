mod result;
mod service;
mod session;
mod video;

pub use result::{FrameResult, LiveResult, Verdict, VideoReport, DECISION_THRESHOLD};
pub use service::ViolenceDetector;
pub use session::{DetectionSession, RESULT_BUFFER};
pub use video::VideoAggregator;
