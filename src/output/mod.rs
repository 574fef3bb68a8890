// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Result aggregation and delivery: progress bar, file writers (TXT / CSV /
//! JSON-lines) and the unix-socket broadcast.

pub mod progress;
pub mod sock;
pub mod writer;

pub use progress::create_progress_bar;
pub use sock::SockBroadcaster;
pub use writer::{detect_format, OutputFormat, ResultRecord, ResultWriter};
