//! Orchestrator: owns the worker threads and the shutdown path.
//!
//! Two threads run the pipeline. The **sampler** is elevated to
//! realtime priority and blocks on the GPIO edge primitive; the
//! **decoder** runs relaxed and drains the matrix through the protocol
//! dispatch. Shutdown sets the cancel flag, lets the sampler's edge
//! wait time out, joins both threads and releases the GPIO line
//! (partial frames in progress are discarded with it).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use log::{debug, error, info, warn};

use crate::clock;
use crate::codec;
use crate::config::Config;
use crate::decoder::decoder::StreamDecoder;
use crate::gpio::{Gpio, SysfsGpio};
use crate::matrix::{Matrix, DISPATCH_AGE_MS};
use crate::rt;
use crate::sampler::realtime::PulseCounters;
use crate::sampler::ring::SampleRing;
use crate::sampler::{realtime, stream};
use crate::{Error, Result};

/// A running receiver. Dropping without [`RfSniffer::close`] leaks the
/// worker threads; close joins them.
pub struct RfSniffer {
    cancel: Arc<AtomicBool>,
    sampler: Option<thread::JoinHandle<()>>,
    decoder: Option<thread::JoinHandle<()>>,
}

impl RfSniffer {
    /// Open the configured RX pin and start both worker threads.
    /// Priority or GPIO failures are fatal here, per the error design.
    pub fn start(cfg: Config) -> Result<Self> {
        cfg.validate()?;
        let gpio = SysfsGpio::input(cfg.rx_pin)?;
        Self::start_inner(cfg, gpio, true)
    }

    /// Start on an injected GPIO (embedders, tests). Missing realtime
    /// privileges only degrade timing here instead of failing startup.
    pub fn start_with_gpio<G: Gpio + Send + 'static>(cfg: Config, gpio: G) -> Result<Self> {
        cfg.validate()?;
        Self::start_inner(cfg, gpio, false)
    }

    fn start_inner<G: Gpio + Send + 'static>(
        cfg: Config,
        mut gpio: G,
        strict_realtime: bool,
    ) -> Result<Self> {
        let cfg = Arc::new(cfg);
        let cancel = Arc::new(AtomicBool::new(false));
        let matrix = Arc::new(Mutex::new(Matrix::new()));
        let ring = Arc::new(SampleRing::new());
        let counters = Arc::new(PulseCounters::new());

        // realtime mode also carries the analyzer states
        let use_realtime = cfg.realtime_mode || cfg.analyzer_mode;

        // the sampler elevates itself; the handshake reports whether
        // that worked before we declare the receiver up
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let sampler = {
            let cfg = cfg.clone();
            let cancel = cancel.clone();
            let matrix = matrix.clone();
            let ring = ring.clone();
            let counters = counters.clone();
            thread::Builder::new()
                .name("sampler".into())
                .spawn(move || {
                    let elevated = rt::elevate_realtime();
                    let fatal = elevated.is_err() && strict_realtime;
                    if let Err(err) = &elevated {
                        if strict_realtime {
                            let _ = ready_tx.send(Err(Error::Thread(format!(
                                "sampler realtime elevation: {err}"
                            ))));
                        } else {
                            warn!("sampler not realtime, timing degraded: {err}");
                        }
                    }
                    if fatal {
                        return;
                    }
                    let _ = ready_tx.send(Ok(()));

                    let result = if use_realtime {
                        realtime::run(&cfg, &mut gpio, &matrix, counters, &cancel)
                    } else {
                        stream::run(&cfg, &mut gpio, &ring, &cancel)
                    };
                    if let Err(err) = result {
                        error!("sampler: {err}");
                        cancel.store(true, Ordering::Relaxed);
                    }
                    // gpio drops here: the line is released on shutdown
                })
                .map_err(|e| Error::Thread(e.to_string()))?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = sampler.join();
                return Err(err);
            }
            Err(_) => {
                let _ = sampler.join();
                return Err(Error::Thread("sampler died during startup".into()));
            }
        }
        info!("started sampler thread");

        let decoder = {
            let cfg = cfg.clone();
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("decoder".into())
                .spawn(move || {
                    if use_realtime {
                        realtime_decoder(&cfg, &matrix, &counters, &cancel);
                    } else {
                        StreamDecoder::new(cfg, ring, matrix).run(&cancel);
                    }
                })
                .map_err(|e| Error::Thread(e.to_string()))?
        };
        info!("started decoder thread");

        Ok(Self {
            cancel,
            sampler: Some(sampler),
            decoder: Some(decoder),
        })
    }

    /// Flag both threads to wind down; shared with signal handlers.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// True once cancellation was requested (e.g. by a signal handler).
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Stop both threads and wait for them.
    pub fn close(mut self) -> Result<()> {
        self.cancel.store(true, Ordering::Relaxed);
        for handle in [self.sampler.take(), self.decoder.take()].into_iter().flatten() {
            handle
                .join()
                .map_err(|_| Error::Thread("worker panicked".into()))?;
        }
        Ok(())
    }
}

/// Realtime-mode decoder thread: pace, wait out a burst in progress,
/// dump the histogram when asked, drain the matrix.
fn realtime_decoder(
    cfg: &Arc<Config>,
    matrix: &Mutex<Matrix>,
    counters: &PulseCounters,
    cancel: &AtomicBool,
) {
    if !cfg.quiet {
        println!(
            "DECODER run every {} ms, {}",
            cfg.decoder_delay_ms,
            if cfg.collect_identical_codes {
                "collect identical codes"
            } else {
                "process each code separately"
            }
        );
    }

    while clock::msleep_cancellable(cfg.decoder_delay_ms, cancel) {
        // repeating transmission: wait until the newest code is old
        // enough that the burst is over
        loop {
            let age = matrix.lock().expect("matrix lock").age_ms();
            if age >= DISPATCH_AGE_MS {
                break;
            }
            debug!("DECODER receiving in progress {age}ms");
            if !clock::msleep_cancellable(100, cancel) {
                return;
            }
        }

        if cfg.pulse_counter_active {
            counters.dump();
        }

        matrix
            .lock()
            .expect("matrix lock")
            .decode(cfg.collect_identical_codes, |protocol, code, repeat| {
                codec::decode(cfg, protocol, code, repeat);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::Level;
    use std::time::{Duration, Instant};

    /// A line with no traffic: every edge wait times out.
    struct IdleGpio;

    impl Gpio for IdleGpio {
        fn read(&mut self) -> Result<Level> {
            Ok(Level::Low)
        }

        fn write(&mut self, _level: Level) -> Result<()> {
            Ok(())
        }

        fn wait_edge(&mut self, _timeout_ms: i32) -> Result<Option<Level>> {
            thread::sleep(Duration::from_millis(10));
            Ok(None)
        }
    }

    #[test]
    fn close_terminates_both_threads_promptly() {
        let cfg = Config {
            quiet: true,
            decoder_delay_ms: 200,
            ..Config::default()
        };
        let sniffer = RfSniffer::start_with_gpio(cfg, IdleGpio).unwrap();

        // let the decoder settle into its pacing sleep
        thread::sleep(Duration::from_millis(50));

        let begin = Instant::now();
        sniffer.close().unwrap();
        // bound: 2 × decoder delay + 100 ms, with scheduling slack
        assert!(begin.elapsed() < Duration::from_millis(2 * 200 + 100 + 200));
    }

    #[test]
    fn invalid_config_fails_startup() {
        let cfg = Config {
            bits_to_sample: 80,
            ..Config::default()
        };
        assert!(RfSniffer::start_with_gpio(cfg, IdleGpio).is_err());
    }
}
