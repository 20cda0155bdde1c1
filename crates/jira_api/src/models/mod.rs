mod search;
mod user;
mod worklog;

pub(crate) use search::{IssueWorklogPage, WorklogSearchPage};
pub use user::UserProfile;
pub use worklog::{IssueWorklog, UserWorklog, WorklogAuthor};
