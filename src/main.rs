use anyhow::{anyhow, bail, Context};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tvctl::{init_logging, list_ports, Config, TvController, TvEvent, BUILD_DATE, VERSION};

const USAGE: &str = "\
usage: tvctl [--config FILE] [--port PATH] <command>

commands:
  status      report power and volume
  on          turn the set on
  off         turn the set off
  volume N    set volume (0-64)
  watch       print changes until Ctrl-C
  ports       list candidate serial ports";

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Status,
    On,
    Off,
    Volume(f64),
    Watch,
    Ports,
}

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    port: Option<String>,
    action: Option<Action>,
    help: bool,
    version: bool,
}

fn parse_args<I>(args: I) -> anyhow::Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "-V" | "--version" => parsed.version = true,
            "-c" | "--config" => {
                let path = args.next().ok_or_else(|| anyhow!("{} needs a file", arg))?;
                parsed.config = Some(PathBuf::from(path));
            }
            "-p" | "--port" => {
                parsed.port = Some(args.next().ok_or_else(|| anyhow!("{} needs a path", arg))?);
            }
            command if parsed.action.is_none() => {
                parsed.action = Some(match command {
                    "status" => Action::Status,
                    "on" => Action::On,
                    "off" => Action::Off,
                    "watch" => Action::Watch,
                    "ports" => Action::Ports,
                    "volume" => {
                        let level = args
                            .next()
                            .ok_or_else(|| anyhow!("volume needs a level"))?;
                        let level: f64 = level
                            .parse()
                            .with_context(|| format!("invalid volume level '{}'", level))?;
                        Action::Volume(level)
                    }
                    other => bail!("unknown command '{}'", other),
                });
            }
            other => bail!("unexpected argument '{}'", other),
        }
    }

    Ok(parsed)
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => match Config::default_path() {
            Ok(path) => Config::load_or_default(&path)
                .with_context(|| format!("loading {}", path.display()))?,
            Err(e) => {
                tracing::debug!("{}", e);
                Config::default()
            }
        },
    };

    if let Some(port) = &args.port {
        config.connection.port = port.clone();
    }
    config.validate()?;
    Ok(config)
}

fn print_ports() -> anyhow::Result<()> {
    let ports = list_ports().context("enumerating serial ports")?;
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for port in ports {
        println!("{}\t{}", port.port_name, port.description);
    }
    Ok(())
}

/// Print events until `until` completes
async fn print_events<F>(events: &mut broadcast::Receiver<TvEvent>, until: F)
where
    F: std::future::Future<Output = ()>,
{
    tokio::pin!(until);
    loop {
        tokio::select! {
            _ = &mut until => break,
            event = events.recv() => match event {
                Ok(event) => println!("{}", event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Missed {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let action = args.action.clone().unwrap_or(Action::Status);
    if action == Action::Ports {
        return print_ports();
    }

    let config = load_config(&args)?;
    let controller_config = config.controller_config();

    // Long enough for the acks and, after power-on, the delayed volume query.
    let settle = controller_config.power_on_query_delay + controller_config.ack_timeout * 2;

    let mut controller = TvController::new(controller_config);
    let mut events = controller.events();
    controller
        .connect()
        .await
        .with_context(|| format!("opening {}", config.connection.port))?;

    match action {
        Action::On => controller.set_power(true),
        Action::Off => controller.set_power(false),
        Action::Volume(level) => {
            // The volume command is only sent while the set is on, so wait
            // for the power state read on open.
            let power = tokio::time::timeout(config.controller_config().ack_timeout, async {
                loop {
                    match events.recv().await {
                        Ok(TvEvent::PowerChanged(on)) => {
                            println!("{}", TvEvent::PowerChanged(on));
                            return on;
                        }
                        Ok(event) => println!("{}", event),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return false,
                    }
                }
            })
            .await
            .unwrap_or(false);

            if !power {
                controller.close().await;
                bail!("the set is off; volume can only be changed while it is on");
            }
            controller.set_volume(level);
        }
        Action::Status | Action::Watch | Action::Ports => {}
    }

    if action == Action::Watch {
        print_events(&mut events, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to wait for Ctrl-C: {}", e);
            }
        })
        .await;
    } else {
        print_events(&mut events, tokio::time::sleep(settle)).await;
    }

    println!("{}", controller.device_state());
    controller.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }
    if args.version {
        println!("tvctl {} (built {})", VERSION, BUILD_DATE);
        return Ok(());
    }

    init_logging()?;
    run(args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Args> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&["on"]).unwrap().action, Some(Action::On));
        assert_eq!(
            parse(&["volume", "32"]).unwrap().action,
            Some(Action::Volume(32.0))
        );
        assert_eq!(parse(&[]).unwrap().action, None);
    }

    #[test]
    fn test_parse_options() {
        let args = parse(&["--port", "/dev/ttyUSB1", "-c", "tv.toml", "watch"]).unwrap();
        assert_eq!(args.port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(args.config, Some(PathBuf::from("tv.toml")));
        assert_eq!(args.action, Some(Action::Watch));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["volume"]).is_err());
        assert!(parse(&["volume", "loud"]).is_err());
        assert!(parse(&["--port"]).is_err());
        assert!(parse(&["reboot"]).is_err());
        assert!(parse(&["on", "off"]).is_err());
    }

    #[test]
    fn test_port_override() {
        let args = parse(&["--config", "/nonexistent/tvctl.toml", "status"]).unwrap();
        assert!(load_config(&args).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tvctl.toml");
        Config::default().save_to_file(&path).unwrap();

        let args = parse(&["-c", path.to_str().unwrap(), "-p", "/dev/ttyS1"]).unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.connection.port, "/dev/ttyS1");
    }
}
