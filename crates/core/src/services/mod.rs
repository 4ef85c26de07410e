//! Business services.

pub mod event_publisher;
pub mod feedback;
pub mod poll;
pub mod user;
pub mod visibility;
pub mod vote;

pub use event_publisher::{NoOpPollEventPublisher, PollEventPublisher, PollEventPublisherService};
pub use feedback::FeedbackService;
pub use poll::{
    CreatePollInput, ListedPoll, PollDetail, PollService, UpdateSettingsInput, VoteHistoryEntry,
};
pub use user::UserService;
pub use visibility::{Capabilities, OptionView, PollView};
pub use vote::VoteService;
