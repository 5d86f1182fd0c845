//! Condition-driven waiting.
//!
//! Nothing in the engine sleeps for a fixed amount of time. Instead it polls the rendered page
//! until whatever it is waiting for shows up, giving up after a budget. Running out of budget is
//! a normal outcome and not an error: the caller decides what a timeout means.

use crate::session::{Session, SessionError};
use scraper::Html;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Waited<T> {
    Ready(T),
    TimedOut,
}

impl<T> Waited<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Waited::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Waited::Ready(v) => Some(v),
            Waited::TimedOut => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    /// Upper bound for the whole wait
    pub timeout: Duration,
    /// Time between two checks
    pub interval: Duration,
}

impl Wait {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn poller(&self) -> Poller {
        Poller {
            deadline: Instant::now() + self.timeout,
            interval: self.interval,
        }
    }

    /// Poll the rendered page until `check` returns something, or the budget runs out.
    /// The check sees a freshly parsed snapshot on every attempt.
    pub async fn until_content<S, T, F>(
        &self,
        session: &mut S,
        mut check: F,
    ) -> Result<Waited<T>, SessionError>
    where
        S: Session,
        F: FnMut(&Html) -> Option<T>,
    {
        let mut poller = self.poller();
        loop {
            let content = session.content().await?;
            if let Some(v) = check(&Html::parse_document(&content)) {
                return Ok(Waited::Ready(v));
            }
            if !poller.tick().await {
                return Ok(Waited::TimedOut);
            }
        }
    }

    /// Wait for the part of the page picked out by `key` to differ from `previous`.
    /// Returns the new key. Changes elsewhere on the page are ignored.
    pub async fn until_changed<S, K, F>(
        &self,
        session: &mut S,
        previous: &K,
        mut key: F,
    ) -> Result<Waited<K>, SessionError>
    where
        S: Session,
        K: PartialEq,
        F: FnMut(&Html) -> K,
    {
        self.until_content(session, |html| {
            let current = key(html);
            (current != *previous).then_some(current)
        })
        .await
    }
}

/// A running wait: knows its deadline and how long to sleep between checks.
#[derive(Debug, Clone)]
pub struct Poller {
    deadline: Instant,
    interval: Duration,
}

impl Poller {
    /// Sleep until the next check is due. Returns false, without sleeping, once the deadline has
    /// passed. Never sleeps past the deadline.
    pub async fn tick(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        sleep(self.interval.min(self.deadline - now)).await;
        true
    }
}

/// Scroll step by step until a step yields no new nodes, or `max_steps` is reached.
/// `count` reports how many candidate nodes a snapshot contains. Returns the final count.
pub async fn settle_scroll<S, F>(
    session: &mut S,
    step: i64,
    max_steps: usize,
    settle: &Wait,
    mut count: F,
) -> Result<usize, SessionError>
where
    S: Session,
    F: FnMut(&Html) -> usize,
{
    let mut seen = count(&Html::parse_document(&session.content().await?));
    for n in 0..max_steps {
        session.scroll_by(step).await?;
        let grown = settle
            .until_content(session, |html| {
                let c = count(html);
                (c > seen).then_some(c)
            })
            .await?;
        match grown {
            Waited::Ready(c) => {
                trace!(step = n, nodes = c, "Scroll step loaded more nodes");
                seen = c;
            }
            Waited::TimedOut => {
                trace!(step = n, nodes = seen, "Scrolling settled");
                break;
            }
        }
    }
    Ok(seen)
}
