//! Turning user input (channel references or pasted video links) into a
//! concrete list of [`WorkItem`](crate::types::WorkItem)s.

pub mod channel;
pub mod date_range;
pub mod listing;
pub mod video_list;

pub use channel::{ChannelInput, resolve_channel, resolve_channels};
pub use date_range::DateRange;
pub use listing::{ListOptions, list_channel_videos, list_videos_for_channels};
pub use video_list::{enrich_video_metadata, extract_video_id, parse_video_list};
