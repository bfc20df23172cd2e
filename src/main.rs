use clap::Parser;
use jsinspect::session::error::Error;
use jsinspect::session::process::{DEFAULT_INSPECT_PORT, TargetSource, wake_target};
use jsinspect::ui::console::AppBuilder;
use std::process::exit;

const USAGE: &str = "Usage: jsinspect script.js [scriptArgs...]
       jsinspect <host>:<port>
       jsinspect -p <pid>
       jsinspect --port=<port> script.js [scriptArgs...]";

#[derive(Parser, Debug)]
#[command(
    name = "jsinspect",
    version,
    about = "Command-line debugger for inspector-protocol targets"
)]
struct Args {
    /// Inspector port used when spawning the target or attaching by pid
    #[clap(long)]
    port: Option<u16>,

    /// Attach to a running process by pid (asks it to start its inspector)
    #[clap(short = 'p', value_name = "PID", conflicts_with = "target")]
    pid: Option<i32>,

    /// script.js [scriptArgs...] to spawn, or host:port to attach
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    target: Vec<String>,
}

fn main() {
    let args = Args::parse();

    let source = match resolve_source(&args) {
        Ok(source) => source,
        Err(ResolveError::Usage) => {
            eprintln!("{USAGE}");
            exit(1);
        }
        Err(ResolveError::Target(e)) => {
            eprintln!("{e}");
            exit(1);
        }
    };

    let run = AppBuilder::new(source).build().and_then(|app| app.run());
    if let Err(e) = run {
        eprintln!("There was an internal error in jsinspect. Please report this bug.");
        eprintln!("{e:#}");
        exit(1);
    }
}

#[derive(Debug)]
enum ResolveError {
    Usage,
    Target(Error),
}

fn resolve_source(args: &Args) -> Result<TargetSource, ResolveError> {
    if let Some(pid) = args.pid {
        wake_target(pid).map_err(ResolveError::Target)?;
        return Ok(TargetSource::Remote {
            host: "127.0.0.1".to_string(),
            port: args.port.unwrap_or(DEFAULT_INSPECT_PORT),
        });
    }

    let Some((first, rest)) = args.target.split_first() else {
        return Err(ResolveError::Usage);
    };

    if let Some((host, port)) = parse_host_port(first) {
        return Ok(TargetSource::Remote { host, port });
    }

    Ok(TargetSource::Spawn {
        script: first.clone(),
        args: rest.to_vec(),
        port: args.port.unwrap_or(DEFAULT_INSPECT_PORT),
    })
}

fn parse_host_port(target: &str) -> Option<(String, u16)> {
    let (host, port) = target.split_once(':')?;
    let port: u16 = port.parse().ok()?;
    if host.is_empty() || host.contains('/') {
        return None;
    }
    Some((host.to_string(), port))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_host_port_shapes() {
        assert_eq!(
            parse_host_port("localhost:9229"),
            Some(("localhost".to_string(), 9229))
        );
        assert_eq!(
            parse_host_port("10.0.0.2:1234"),
            Some(("10.0.0.2".to_string(), 1234))
        );
        assert_eq!(parse_host_port("break.js"), None);
        assert_eq!(parse_host_port("dir/with:colon.js"), None);
        assert_eq!(parse_host_port(":9229"), None);
    }

    #[test]
    fn test_spawn_shape_keeps_script_args() {
        let args = Args::try_parse_from(["jsinspect", "app.js", "--flag", "value"]).unwrap();
        match resolve_source(&args) {
            Ok(TargetSource::Spawn { script, args, port }) => {
                assert_eq!(script, "app.js");
                assert_eq!(args, vec!["--flag".to_string(), "value".to_string()]);
                assert_eq!(port, DEFAULT_INSPECT_PORT);
            }
            other => panic!("unexpected: {other:?}"),
        }

        let args = Args::try_parse_from(["jsinspect", "--port=9230", "app.js"]).unwrap();
        match resolve_source(&args) {
            Ok(TargetSource::Spawn { port, .. }) => assert_eq!(port, 9230),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_attach_shape() {
        let args = Args::try_parse_from(["jsinspect", "localhost:9229"]).unwrap();
        match resolve_source(&args) {
            Ok(TargetSource::Remote { host, port }) => {
                assert_eq!(host, "localhost");
                assert_eq!(port, 9229);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_pid_follows_the_flag() {
        // the pid is read from the argument after -p, wherever the flag
        // sits on the command line
        let args = Args::try_parse_from(["jsinspect", "-p", "4242"]).unwrap();
        assert_eq!(args.pid, Some(4242));

        let args = Args::try_parse_from(["jsinspect", "--port=9230", "-p", "4242"]).unwrap();
        assert_eq!(args.pid, Some(4242));
        assert_eq!(args.port, Some(9230));
    }

    #[test]
    fn test_zero_args_is_a_usage_error() {
        let args = Args::try_parse_from(["jsinspect"]).unwrap();
        assert!(matches!(resolve_source(&args), Err(ResolveError::Usage)));
    }
}
