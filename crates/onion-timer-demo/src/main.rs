// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Drives a repeating timer from the command line.
//!
//! Usage: `onion-timer-demo [config.json]`. Without a config file the timer
//! ticks every 3 seconds. After 11 seconds the period drops to 100 ms, and the
//! program runs until Enter is pressed.

use anyhow::{Context, Result};
use onion_timer::{IntervalTimer, TimerConfig};
use std::thread;
use std::time::{Duration, Instant};

const SWITCH_AFTER: Duration = Duration::from_secs(11);
const FAST_PERIOD: Duration = Duration::from_millis(100);

fn load_config() -> Result<TimerConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read timer config '{path}'"))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse timer config '{path}'"))
        }
        None => Ok(TimerConfig::default().with_period(Duration::from_secs(3))),
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    log::info!("Timer demo: {config:?}");

    let timer = IntervalTimer::from_config(&config);
    let origin = Instant::now();
    timer.set_handler(move || {
        log::info!("Tick at +{:.3}s", origin.elapsed().as_secs_f64());
    });
    timer.try_start()?;

    thread::sleep(SWITCH_AFTER);
    timer.set_period(FAST_PERIOD);
    log::info!("Period switched to {FAST_PERIOD:?}. Press Enter to stop.");

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;

    timer.stop();
    log::info!("Timer stopped.");
    Ok(())
}
