//! Watch GPIO lines and print their edge events
//!
//! # Environment Variables
//!
//! - `GPIO_LINES=17,27` - Lines to watch (already exported)
//! - `GPIO_EDGE=both` - Trigger to configure: none, rising, falling, both
//! - `GPIO_WATCH_SECS=10` - Stop after this many seconds (0 = until killed)
//! - `GPIO_SYSFS_ROOT=/sys/class/gpio` - Where the `gpioN` directories live
//! - `GPIO_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)

use gpioirq::{env_get, env_get_str, init_logging, kerror, kinfo, kwarn};
use gpioirq::{Edge, EdgeQueue, EngineConfig, GpioResult, InterruptEngine, LineId, SysfsLine};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

// GPIO_LINES=17 GPIO_LOG_LEVEL=debug cargo run -p gpioirq-edge-watch
fn main() {
    init_logging();

    let lines = parse_lines(&env_get_str("GPIO_LINES", "17"));
    let edge = match parse_edge(&env_get_str("GPIO_EDGE", "both")) {
        Some(edge) => edge,
        None => {
            kerror!("GPIO_EDGE must be one of none, rising, falling, both");
            std::process::exit(2);
        }
    };
    let secs: u64 = env_get("GPIO_WATCH_SECS", 10);

    if lines.is_empty() {
        kerror!("GPIO_LINES names no lines");
        std::process::exit(2);
    }

    if let Err(e) = run(&lines, edge, secs) {
        kerror!("edge-watch: {}", e);
        std::process::exit(1);
    }
}

fn run(lines: &[LineId], edge: Edge, secs: u64) -> GpioResult<()> {
    let config = EngineConfig::from_env();
    let engine = InterruptEngine::new(config.clone())?;
    let queue = EdgeQueue::new(1024);

    let watched = watch_lines(&engine, &config.sysfs_root, &queue, lines, edge)?;
    if watched.is_empty() {
        kwarn!("no line could be watched");
        return Ok(());
    }

    println!("=== edge-watch: {} line(s), edge={} ===", watched.len(), edge);

    let start = Instant::now();
    let limit = Duration::from_secs(secs);
    while secs == 0 || start.elapsed() < limit {
        for event in queue.drain() {
            println!("[{:>8.3}s] #{} {} -> {}", start.elapsed().as_secs_f64(), event.seq, event.line, event.value);
        }
        if let Some(err) = engine.last_error() {
            kwarn!("dispatcher stopped: {}", err);
            return Err(err);
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    for line in watched {
        engine.deregister(line)?;
    }

    let stats = engine.stats();
    println!(
        "\n=== {} event(s), {} wake-up(s), {} dropped ===",
        stats.events,
        stats.wakeups,
        queue.dropped()
    );
    Ok(())
}

/// Arm and register each line, returning the ones now watched
///
/// Fatal errors abort; a line the engine refuses is skipped.
fn watch_lines(
    engine: &InterruptEngine,
    root: &Path,
    queue: &Arc<EdgeQueue>,
    lines: &[LineId],
    edge: Edge,
) -> GpioResult<Vec<LineId>> {
    if !edge.is_armed() {
        kwarn!("edge={} raises no events; lines will stay silent", edge);
    }

    let mut watched = Vec::with_capacity(lines.len());
    for &line in lines {
        let armed = SysfsLine::open(root, line)
            .and_then(|sysfs| sysfs.set_edge(edge))
            .and_then(|()| engine.register_callback(line, queue.callback(line)));
        match armed {
            Ok(()) => {
                kinfo!("watching {} ({})", line, edge);
                watched.push(line);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => kwarn!("skipping {}: {}", line, e),
        }
    }
    Ok(watched)
}

fn parse_lines(raw: &str) -> Vec<LineId> {
    raw.split(',')
        .filter_map(|s| {
            let s = s.trim();
            match s.parse::<u32>() {
                Ok(n) => Some(LineId::new(n)),
                Err(_) if s.is_empty() => None,
                Err(_) => {
                    kwarn!("ignoring bad line number {:?}", s);
                    None
                }
            }
        })
        .collect()
}

fn parse_edge(raw: &str) -> Option<Edge> {
    [Edge::None, Edge::Rising, Edge::Falling, Edge::Both]
        .into_iter()
        .find(|e| e.as_str().eq_ignore_ascii_case(raw.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpioirq::{GpioError, RegistryError, ResourceOp};
    use std::path::PathBuf;

    fn sysfs_dir(tag: &str, lines: &[u32]) -> PathBuf {
        let root = std::env::temp_dir().join(format!("edge-watch-{}-{}", tag, std::process::id()));
        for line in lines {
            let dir = root.join(format!("gpio{}", line));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("value"), b"0").unwrap();
            std::fs::write(dir.join("edge"), b"none").unwrap();
        }
        root
    }

    #[test]
    fn test_parse_lines_and_edge() {
        assert_eq!(parse_lines("17, 27,,x"), vec![LineId::new(17), LineId::new(27)]);
        assert!(parse_lines("").is_empty());
        assert_eq!(parse_edge(" Both "), Some(Edge::Both));
        assert_eq!(parse_edge("none"), Some(Edge::None));
        assert_eq!(parse_edge("up"), None);
    }

    #[test]
    fn test_duplicate_line_is_skipped() {
        let root = sysfs_dir("dup", &[17, 27]);
        let engine = InterruptEngine::new(EngineConfig::new().sysfs_root(&root)).unwrap();
        let queue = EdgeQueue::new(16);
        let lines = [LineId::new(17), LineId::new(27), LineId::new(17)];

        let watched = watch_lines(&engine, &root, &queue, &lines, Edge::Both).unwrap();
        assert_eq!(watched, vec![LineId::new(17), LineId::new(27)]);
        assert_eq!(std::fs::read(root.join("gpio27/edge")).unwrap(), b"both");

        // Registering the same line again is refused without aborting.
        let err = engine.register_callback(LineId::new(17), queue.callback(17u32)).unwrap_err();
        assert_eq!(err, GpioError::Registry(RegistryError::AlreadyWatched(LineId::new(17))));
        assert!(!err.is_fatal());

        engine.shutdown();
        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_missing_line_aborts() {
        let root = sysfs_dir("missing", &[4]);
        let engine = InterruptEngine::new(EngineConfig::new().sysfs_root(&root)).unwrap();
        let queue = EdgeQueue::new(16);

        let err = watch_lines(&engine, &root, &queue, &[LineId::new(4), LineId::new(5)], Edge::None)
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, GpioError::Resource(ref r) if r.op == ResourceOp::Open));
        assert_eq!(std::fs::read(root.join("gpio4/edge")).unwrap(), b"none");
        assert_eq!(engine.watched(), vec![LineId::new(4)]);

        engine.shutdown();
        std::fs::remove_dir_all(root).unwrap();
    }
}
