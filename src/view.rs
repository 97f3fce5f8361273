use std::fmt::Display;
use tracing::debug;

/// Request id; only the most recent one may update the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug)]
pub struct ViewState<T> {
    issued: u64,
    loading: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self {
            issued: 0,
            loading: false,
            data: None,
            error: None,
        }
    }
}

impl<T> ViewState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> Ticket {
        self.issued += 1;
        self.loading = true;
        self.error = None;
        Ticket(self.issued)
    }

    pub fn is_latest(&self, ticket: Ticket) -> bool {
        ticket.0 == self.issued
    }

    /// Applies a load result. Returns `false` and leaves the state alone when
    /// a newer load has been issued since `ticket`.
    pub fn finish<E: Display>(&mut self, ticket: Ticket, result: Result<T, E>) -> bool {
        if !self.is_latest(ticket) {
            debug!(ticket = ticket.0, latest = self.issued, "dropping stale response");
            return false;
        }
        self.loading = false;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            Err(err) => self.error = Some(err.to_string()),
        }
        true
    }

    pub fn status(&self) -> Status {
        if self.loading {
            Status::Loading
        } else if self.error.is_some() {
            Status::Failed
        } else if self.data.is_some() {
            Status::Ready
        } else {
            Status::Idle
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut T> {
        self.data.as_mut()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_through_loading_to_ready() {
        let mut view: ViewState<Vec<u32>> = ViewState::new();
        assert_eq!(view.status(), Status::Idle);
        let ticket = view.begin();
        assert_eq!(view.status(), Status::Loading);
        assert!(view.finish::<String>(ticket, Ok(vec![1, 2])));
        assert_eq!(view.status(), Status::Ready);
        assert_eq!(view.data(), Some(&vec![1, 2]));
    }

    #[test]
    fn stale_response_cannot_overwrite_newer_one() {
        let mut view: ViewState<&str> = ViewState::new();
        let older = view.begin();
        let newer = view.begin();
        assert!(view.finish::<String>(newer, Ok("march")));
        assert!(!view.finish::<String>(older, Ok("february")));
        assert_eq!(view.data(), Some(&"march"));
        assert_eq!(view.status(), Status::Ready);
    }

    #[test]
    fn stale_response_is_dropped_even_if_it_arrives_first() {
        let mut view: ViewState<&str> = ViewState::new();
        let older = view.begin();
        let newer = view.begin();
        assert!(!view.finish::<String>(older, Ok("february")));
        assert_eq!(view.status(), Status::Loading);
        assert!(view.finish::<String>(newer, Ok("march")));
        assert_eq!(view.data(), Some(&"march"));
    }

    #[test]
    fn failure_keeps_previous_data() {
        let mut view: ViewState<u32> = ViewState::new();
        let t = view.begin();
        view.finish::<String>(t, Ok(7));
        let t = view.begin();
        view.finish(t, Err("503 backend unavailable"));
        assert_eq!(view.status(), Status::Failed);
        assert_eq!(view.error(), Some("503 backend unavailable"));
        assert_eq!(view.data(), Some(&7));

        let t = view.begin();
        assert_eq!(view.error(), None);
        view.finish::<String>(t, Ok(8));
        assert_eq!(view.status(), Status::Ready);
    }
}
