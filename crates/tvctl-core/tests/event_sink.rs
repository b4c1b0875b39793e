//! Event sink behaviour as seen from outside the crate

use parking_lot::Mutex;
use std::sync::Arc;
use tvctl_core::{EventFilter, EventSink, EventSinkConfig, TvEvent};

#[test]
fn test_publish_from_many_threads() {
    let sink = Arc::new(EventSink::new());
    let volumes = Arc::new(Mutex::new(Vec::new()));

    let seen = volumes.clone();
    sink.subscribe(EventFilter::Volume, move |event| {
        if let TvEvent::VolumeChanged(level) = event {
            seen.lock().push(level);
        }
    });

    let threads: Vec<_> = (0..4u8)
        .map(|t| {
            let sink = sink.clone();
            std::thread::spawn(move || {
                for i in 0..8u8 {
                    sink.publish(TvEvent::VolumeChanged(t * 8 + i));
                    sink.publish(TvEvent::PowerChanged(i % 2 == 0));
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    let mut volumes = volumes.lock().clone();
    volumes.sort_unstable();
    assert_eq!(volumes, (0..32).collect::<Vec<u8>>());
}

#[tokio::test]
async fn test_slow_receiver_lags_without_blocking_publisher() {
    let sink = EventSink::with_config(EventSinkConfig {
        channel_capacity: 2,
    });
    let mut receiver = sink.receiver();

    for level in 0..5 {
        sink.publish(TvEvent::VolumeChanged(level));
    }

    assert!(matches!(
        receiver.recv().await,
        Err(tokio::sync::broadcast::error::RecvError::Lagged(3))
    ));
    assert_eq!(receiver.recv().await.unwrap(), TvEvent::VolumeChanged(3));
    assert_eq!(receiver.recv().await.unwrap(), TvEvent::VolumeChanged(4));
}

#[test]
fn test_events_serialize() {
    let json = serde_json::to_string(&TvEvent::VolumeChanged(12)).unwrap();
    let back: TvEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, TvEvent::VolumeChanged(12));
    assert_eq!(TvEvent::PowerChanged(true).to_string(), "power-changed(true)");
}
