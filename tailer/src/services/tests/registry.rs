//! Tests for the SubscriberRegistry service

use super::fixtures::*;
use crate::services::{RealSubscriberRegistry, Subscriber, Subscription};
use crate::traits::SubscriberRegistry;
use crate::types::Line;

mod real_subscriber_registry_tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_starts_empty() {
        let registry = RealSubscriberRegistry::new();
        assert_eq!(registry.subscriber_count(), 0);
        assert_eq!(*registry.watch_count().borrow(), 0);
    }

    #[tokio::test]
    async fn test_add_returns_total() {
        let registry = create_test_registry();
        let (first, total) = Subscription::register(registry.clone(), 4);
        assert_eq!(total, 1);
        let (second, total) = Subscription::register(registry.clone(), 4);
        assert_eq!(total, 2);

        assert_eq!(registry.subscriber_count(), 2);
        assert!(registry.remove(first.id()));
        assert_eq!(registry.subscriber_count(), 1);
        assert!(registry.remove(second.id()));
        assert_eq!(*registry.watch_count().borrow(), 0);
    }

    #[tokio::test]
    async fn test_remove_unknown_is_noop() {
        let registry = RealSubscriberRegistry::new();
        let (subscriber, _inbox) = Subscriber::channel(1);
        assert!(!registry.remove(subscriber.id()));
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber_in_order() {
        let registry = create_test_registry();
        let mut a = subscribe(&registry, 8);
        let mut b = subscribe(&registry, 8);

        for text in ["one", "two", "three"] {
            let outcome = registry.publish(Line::from(text));
            assert_eq!(outcome.delivered, 2);
            assert_eq!(outcome.ejected, 0);
        }

        assert_eq!(drain(a.inbox()), vec!["one", "two", "three"]);
        assert_eq!(drain(b.inbox()), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_publish_shares_one_allocation() {
        let registry = create_test_registry();
        let mut a = subscribe(&registry, 2);
        let mut b = subscribe(&registry, 2);

        let line = Line::from("shared");
        registry.publish(line.clone());

        let from_a = a.inbox().try_recv().unwrap();
        let from_b = b.inbox().try_recv().unwrap();
        assert!(from_a.shares_allocation(&line));
        assert!(from_b.shares_allocation(&line));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let registry = RealSubscriberRegistry::new();
        let outcome = registry.publish(Line::from("nobody listening"));
        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.ejected, 0);
    }

    #[tokio::test]
    async fn test_full_queue_ejects_only_the_slow_subscriber() {
        let registry = create_test_registry();
        let mut slow = subscribe(&registry, 1);
        let mut fast = subscribe(&registry, 8);

        let first = registry.publish(Line::from("a"));
        assert_eq!(first.delivered, 2);

        // The slow queue is already full.
        let second = registry.publish(Line::from("b"));
        assert_eq!(second.delivered, 1);
        assert_eq!(second.ejected, 1);

        assert!(slow.inbox().is_ejected());
        assert!(!fast.inbox().is_ejected());
        assert_eq!(drain(fast.inbox()), vec!["a", "b"]);
        assert_eq!(drain(slow.inbox()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_eject_fires_once() {
        let (subscriber, inbox) = Subscriber::channel(1);
        let ejector = subscriber.ejector().clone();

        assert!(!ejector.is_ejected());
        assert!(ejector.eject());
        assert!(!ejector.eject());
        assert!(ejector.is_ejected());
        assert!(inbox.is_ejected());
    }

    #[tokio::test]
    async fn test_ejected_subscriber_stays_registered_until_it_deregisters() {
        let registry = create_test_registry();
        let mut slow = subscribe(&registry, 1);

        registry.publish(Line::from("a"));
        registry.publish(Line::from("b"));
        registry.publish(Line::from("c"));
        assert!(slow.inbox().is_ejected());
        assert_eq!(registry.subscriber_count(), 1);

        assert!(slow.deregister());
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_queue_counts_as_ejected() {
        let registry = RealSubscriberRegistry::new();
        let (subscriber, inbox) = Subscriber::channel(4);
        let ejector = subscriber.ejector().clone();
        registry.add(subscriber);
        drop(inbox);

        let outcome = registry.publish(Line::from("gone"));
        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.ejected, 1);
        assert!(ejector.is_ejected());
    }
}

mod subscription_tests {
    use super::*;

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let registry = create_test_registry();
        let mut subscription = subscribe(&registry, 4);
        assert_eq!(registry.subscriber_count(), 1);

        assert!(subscription.deregister());
        assert!(!subscription.deregister());
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_deregisters() {
        let registry = create_test_registry();
        {
            let _subscription = subscribe(&registry, 4);
            assert_eq!(registry.subscriber_count(), 1);
        }
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_count_watch_follows_membership() {
        let registry = create_test_registry();
        let mut count = registry.watch_count();

        let first = subscribe(&registry, 4);
        let second = subscribe(&registry, 4);
        assert_eq!(*count.borrow_and_update(), 2);

        drop(first);
        drop(second);
        let drained = tokio::time::timeout(std::time::Duration::from_secs(1), count.wait_for(|n| *n == 0)).await;
        assert!(drained.is_ok());
    }

    #[tokio::test]
    async fn test_registered_subscriber_receives_published_line() {
        let registry = create_test_registry();
        let mut subscription = subscribe(&registry, 4);

        let publisher = registry.clone();
        tokio::spawn(async move {
            publisher.publish(Line::from("hello"));
        });

        let line = recv_within(subscription.inbox()).await;
        assert_eq!(line.as_deref(), Some("hello"));
    }
}
