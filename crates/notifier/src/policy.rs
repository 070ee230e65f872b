//! Acknowledgment policy for the welcome queue.

use std::num::NonZeroU32;

use thiserror::Error;

use userhub_events::{AckPolicy, QueueSpec};

/// A retry cap was configured for a queue that never reports attempt numbers.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("retry cap of {max} needs a quorum queue; {queue} is {queue_type}")]
pub struct UnsupportedRetryCap {
    pub max: NonZeroU32,
    pub queue: String,
    pub queue_type: &'static str,
}

/// Build the policy for `queue`, refusing a cap the queue cannot enforce.
pub fn delivery_policy(
    max_attempts: Option<NonZeroU32>,
    queue: &QueueSpec,
) -> Result<AckPolicy, UnsupportedRetryCap> {
    match max_attempts {
        None => Ok(AckPolicy::unbounded()),
        Some(max) if queue.queue_type.counts_deliveries() => Ok(AckPolicy::with_max_attempts(max)),
        Some(max) => Err(UnsupportedRetryCap {
            max,
            queue: queue.name.clone(),
            queue_type: queue.queue_type.as_str(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use userhub_events::topology::WELCOME_EMAIL_QUEUE;
    use userhub_events::{QueueType, Topology};

    use super::*;

    fn welcome_queue() -> QueueSpec {
        Topology::welcome_email()
            .queue(WELCOME_EMAIL_QUEUE)
            .cloned()
            .unwrap()
    }

    #[test]
    fn no_cap_is_unbounded() {
        let policy = delivery_policy(None, &welcome_queue()).unwrap();
        assert_eq!(policy, AckPolicy::unbounded());
    }

    #[test]
    fn cap_is_accepted_on_the_welcome_queue() {
        let max = NonZeroU32::new(3).unwrap();
        let policy = delivery_policy(Some(max), &welcome_queue()).unwrap();
        assert_eq!(policy.max_attempts(), Some(max));
    }

    #[test]
    fn cap_is_refused_on_a_classic_queue() {
        let mut queue = welcome_queue();
        queue.queue_type = QueueType::Classic;

        let err = delivery_policy(NonZeroU32::new(3), &queue).unwrap_err();

        assert_eq!(err.queue, "welcome_email_queue");
        assert_eq!(err.queue_type, "classic");
    }
}
