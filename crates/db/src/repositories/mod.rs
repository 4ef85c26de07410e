//! Database repositories.

mod feedback;
mod poll;
mod user;
mod vote;

pub use feedback::FeedbackRepository;
pub use poll::PollRepository;
pub use user::UserRepository;
pub use vote::VoteRepository;
