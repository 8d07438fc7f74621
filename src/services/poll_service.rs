//! Poll-and-publish loop.
//!
//! `Init -> Connected -> Polling -> Terminated`. Read and send failures are
//! reported and the loop carries on with the next tick; only a shutdown
//! signal or loss of the serial link ends it. Both handles are released
//! exactly once on the way out.

use log::{debug, error, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use crate::modbus::{DeviceAddress, ModbusClientTrait, ModbusReader, ReadResult};
use crate::output::{encode, DataSender};
use crate::utils::error::ModbusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Init,
    Connected,
    Polling,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// SIGINT/SIGTERM or any other requested stop.
    Shutdown,
    /// The serial link is gone; nothing left to poll.
    Fatal(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    pub ticks: u64,
    pub successful_reads: u64,
    pub failed_reads: u64,
    pub failed_sends: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub read_ok: bool,
    pub sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: Termination,
    pub stats: PollStats,
}

pub struct PollLoop<C: ModbusClientTrait, S: DataSender> {
    client: C,
    sender: S,
    address: DeviceAddress,
    interval: Duration,
    state: PollState,
    stats: PollStats,
}

impl<C: ModbusClientTrait, S: DataSender> PollLoop<C, S> {
    /// Takes a connected serial client and acquires the publisher. If the
    /// interval is zero or the publisher cannot be acquired the client is
    /// closed before the error is returned.
    pub async fn init<F>(
        mut client: C,
        address: DeviceAddress,
        interval: Duration,
        connect_sender: F,
    ) -> Result<Self, ModbusError>
    where
        F: Future<Output = Result<S, ModbusError>>,
    {
        debug!("PollLoop state: {:?}", PollState::Init);
        if interval.is_zero() {
            error!("❌ Poll interval must be positive");
            client.close();
            return Err(ModbusError::ConfigError("poll interval must be positive".into()));
        }

        match connect_sender.await {
            Ok(sender) => {
                info!(
                    "✅ Polling slave {} every {:?}, publishing to {} {}",
                    address.slave_id,
                    interval,
                    sender.sender_type(),
                    sender.destination()
                );
                Ok(Self {
                    client,
                    sender,
                    address,
                    interval,
                    state: PollState::Connected,
                    stats: PollStats::default(),
                })
            }
            Err(e) => {
                error!("❌ Publisher setup failed: {}", e);
                client.close();
                Err(e)
            }
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn stats(&self) -> PollStats {
        self.stats
    }

    /// One read-encode-send cycle. `Err` only for failures that end the loop.
    pub async fn tick(&mut self) -> Result<TickReport, ModbusError> {
        if self.state == PollState::Terminated {
            return Err(ModbusError::LinkLost("poll loop already terminated".into()));
        }
        self.state = PollState::Polling;
        self.stats.ticks += 1;

        let result = match ModbusReader::read_address(&mut self.client, &self.address).await {
            Ok(values) => {
                self.stats.successful_reads += 1;
                info!("✅ Read {} points successfully", values.len());
                ReadResult::Success(values)
            }
            Err(e) if e.is_recoverable() => {
                self.stats.failed_reads += 1;
                warn!("⚠️ Failed to read: {}", e);
                ReadResult::from_error(&e)
            }
            Err(e) => {
                self.stats.failed_reads += 1;
                error!("💥 Unrecoverable read failure: {}", e);
                return Err(e);
            }
        };

        let payload = encode(&result);
        info!("📋 Result: {}", payload);

        let sent = match self.sender.send(&payload).await {
            Ok(()) => true,
            Err(e) => {
                self.stats.failed_sends += 1;
                error!("❌ Send to {} failed: {}", self.sender.destination(), e);
                false
            }
        };

        Ok(TickReport {
            read_ok: result.is_success(),
            sent,
        })
    }

    /// Ticks on a monotonic interval until `shutdown` resolves or the serial
    /// link is lost, then releases both handles.
    pub async fn run_until<F>(mut self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("🔄 Starting poll loop (Ctrl+C to stop)");
        let reason = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("🛑 Shutdown requested");
                    break Termination::Shutdown;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        break Termination::Fatal(e.to_string());
                    }
                }
            }
        };

        self.terminate().await;
        RunSummary {
            reason,
            stats: self.stats,
        }
    }

    /// Releases the serial client and the publisher. Idempotent.
    pub async fn terminate(&mut self) {
        if self.state == PollState::Terminated {
            return;
        }
        self.client.close();
        self.sender.close().await;
        self.state = PollState::Terminated;

        let stats = self.stats;
        info!("📊 Final Statistics:");
        info!("   ⏱️  Ticks: {}", stats.ticks);
        info!("   ✅ Successful reads: {}", stats.successful_reads);
        info!("   ❌ Failed reads: {}", stats.failed_reads);
        info!("   📡 Failed sends: {}", stats.failed_sends);
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!("⚠️ Failed to install SIGTERM handler: {}. Only Ctrl+C will stop the loop", e);
                None
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                match term_signal {
                    Some(mut sig) => {
                        sig.recv().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
