//! External collaborator seams for the device runtime.
//!
//! Telemetry upload and command subscription are owned by other parts of
//! the product; the runtime only needs somewhere to hand a reading and
//! something to call when a command arrives. These traits fix those seams
//! without implying any behavior behind them.

use async_trait::async_trait;

use crate::error::Result;

/// Accepts sensor readings from the device runtime.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Accept one reading.
    async fn record(&self, reading: serde_json::Value) -> Result<()>;
}

/// Invoked when a command arrives for this device.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle one command.
    async fn on_command(&self, command: serde_json::Value) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        readings: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl TelemetrySink for RecordingSink {
        async fn record(&self, reading: serde_json::Value) -> Result<()> {
            self.readings.lock().unwrap().push(reading);
            Ok(())
        }
    }

    #[tokio::test]
    async fn traits_are_object_safe() {
        let sink = RecordingSink {
            readings: Mutex::new(Vec::new()),
        };
        let dyn_sink: &dyn TelemetrySink = &sink;

        dyn_sink
            .record(serde_json::json!({ "sensor": "temp", "value": 21.5 }))
            .await
            .unwrap();

        assert_eq!(sink.readings.lock().unwrap().len(), 1);
    }
}
