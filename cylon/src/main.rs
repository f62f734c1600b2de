#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{self, WrapErr as _};
use humantime::parse_duration;
use orb_cylon::button::{Buttons, ButtonsJoinHandle};
use orb_cylon::config::{DEFAULT_LED_PINS, DEFAULT_LOWER_PIN, DEFAULT_RAISE_PIN};
use orb_cylon::gpio::GpioIndicators;
use orb_cylon::rate::DEFAULT_LIMIT;
use orb_cylon::telemetry::{self, SYSLOG_IDENTIFIER};
use orb_cylon::{
    BoundaryPolicy, ButtonLayout, Channel, Config, Cylon, Pins, SystemClock,
};
use orb_sysfs_gpio::{Chip, DEFAULT_ROOT};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time;
use tracing::{debug, info, warn};

/// How often the daemon checks whether the sweep worker halted on its own.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[clap(
    version,
    about = "Cylon LED daemon",
    long_about = "Sweeps a row of GPIO LEDs back and forth. Buttons slow the sweep down or speed it up."
)]
struct Args {
    /// GPIOs of the LEDs, in sweep order
    #[arg(
        long,
        env = "CYLON_LED_PINS",
        value_delimiter = ',',
        default_values_t = DEFAULT_LED_PINS
    )]
    led_pins: Vec<u32>,

    /// GPIO of the button slowing the sweep down
    #[arg(long, env = "CYLON_RAISE_PIN", default_value_t = DEFAULT_RAISE_PIN)]
    raise_pin: u32,

    /// GPIO of the button speeding the sweep up
    #[arg(long, env = "CYLON_LOWER_PIN", default_value_t = DEFAULT_LOWER_PIN)]
    lower_pin: u32,

    /// Only use the raise button, stepping in the current direction
    #[arg(long)]
    single_button: bool,

    /// Delay between two steps at rate level zero
    #[arg(long, env = "CYLON_BASE_SLEEP", default_value = "100ms", value_parser = parse_duration)]
    base_sleep: Duration,

    /// Highest rate level, in either direction
    #[arg(long, env = "CYLON_LIMIT", default_value_t = DEFAULT_LIMIT)]
    limit: u16,

    /// What presses past the highest rate level do. Defaults to clamp, or to
    /// bounce with --single-button
    #[arg(long, env = "CYLON_POLICY", value_enum)]
    policy: Option<Policy>,

    /// Location of the sysfs gpio class
    #[arg(long, env = "CYLON_GPIO_ROOT", default_value = DEFAULT_ROOT)]
    gpio_root: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    /// Stay at the limit
    Clamp,
    /// Turn around at the limit
    Bounce,
}

impl From<Policy> for BoundaryPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Clamp => BoundaryPolicy::Clamp,
            Policy::Bounce => BoundaryPolicy::Bounce,
        }
    }
}

impl Args {
    fn buttons(&self) -> ButtonLayout {
        if self.single_button {
            ButtonLayout::Single {
                pin: self.raise_pin,
            }
        } else {
            ButtonLayout::Dual {
                raise: self.raise_pin,
                lower: self.lower_pin,
            }
        }
    }

    fn config(&self) -> Config {
        let policy = self
            .policy
            .map_or_else(|| self.buttons().default_policy(), BoundaryPolicy::from);
        Config {
            base_sleep: self.base_sleep,
            limit: self.limit,
            policy,
        }
    }

    fn pins(&self) -> Pins {
        Pins {
            leds: self.led_pins.clone(),
            buttons: self.buttons(),
        }
    }
}

enum Exit {
    Signal(&'static str),
    WorkerHalted,
    ButtonsEnded(eyre::Result<()>),
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    telemetry::init(SYSLOG_IDENTIFIER).wrap_err("failed to initialize telemetry")?;
    let args = Args::parse();
    debug!(?args, "starting cylon");

    run(args).await
}

async fn run(args: Args) -> eyre::Result<()> {
    let config = args.config();
    let pins = args.pins();
    pins.validate(config.policy)?;

    let chip = Chip::new(&args.gpio_root);
    let leds =
        GpioIndicators::open(&chip, &pins.leds).wrap_err("failed to set up LED lines")?;
    let cylon = Cylon::new(&config, leds, SystemClock)?;
    let handler = cylon.event_handler(pins.buttons.bindings());
    let inputs = pins
        .buttons
        .pins()
        .into_iter()
        .map(|pin| chip.input(pin).map(|line| (Channel(pin), line)))
        .collect::<Result<Vec<_>, _>>()
        .wrap_err("failed to set up button lines")?;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut running = cylon.start()?;
    let (buttons, mut buttons_handle) = Buttons::spawn(inputs, handler);
    info!("cylon running");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut worker_poll = time::interval(WORKER_POLL_INTERVAL);
    let exit = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Exit::Signal("SIGINT"),
            _ = sigterm.recv() => break Exit::Signal("SIGTERM"),
            result = &mut buttons_handle.0 => {
                let result = result
                    .wrap_err("button task panicked")
                    .and_then(|r| r.wrap_err("button task failed"));
                break Exit::ButtonsEnded(result);
            }
            _ = worker_poll.tick() => {
                if running.is_finished() {
                    break Exit::WorkerHalted;
                }
            }
        }
    };
    let buttons_result = match exit {
        Exit::Signal(signal) => {
            info!(signal, "received signal, shutting down");
            stop_buttons(buttons, buttons_handle).await
        }
        Exit::WorkerHalted => {
            warn!("sweep worker halted, shutting down");
            stop_buttons(buttons, buttons_handle).await
        }
        Exit::ButtonsEnded(result) => {
            warn!("button task ended, shutting down");
            result
        }
    };
    // Joining waits for up to one tick delay.
    let sweep_result = tokio::task::spawn_blocking(move || running.stop())
        .await
        .wrap_err("sweep shutdown panicked")?;

    sweep_result.wrap_err("sweep failed")?;
    buttons_result?;
    info!("goodbye");
    Ok(())
}

async fn stop_buttons(buttons: Buttons, handle: ButtonsJoinHandle) -> eyre::Result<()> {
    if buttons.kill_tx.send(()).is_err() {
        debug!("button task already gone");
    }
    handle
        .0
        .await
        .wrap_err("button task panicked")?
        .wrap_err("button task failed")
}
