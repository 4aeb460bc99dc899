//! ogg-opus - 命令行播放器
//!
//! 用桌面引擎播放单个曲目，每次状态通知输出一行 JSON

use std::path::{Path, PathBuf};

use crossbeam_channel::bounded;
use ogg_opus_player::desktop::probe;
use ogg_opus_player::{PlaybackStatus, Player, PlayerConfig};
use tracing_subscriber::EnvFilter;

fn usage(program: &str) -> ! {
    eprintln!("Usage:");
    eprintln!("  {} play <input.ogg> [--rate R] [--config cfg.json]", program);
    eprintln!("  {} info <input.ogg>   # prints JSON (sample_rate/channels/duration/codec)", program);
    std::process::exit(1);
}

fn main() {
    // log 记录经 tracing-log 转发，RUST_LOG 控制级别
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        usage(&args[0]);
    }

    let input = PathBuf::from(&args[2]);
    let code = match args[1].as_str() {
        "play" => {
            let mut rate = 1.0;
            let mut config = PlayerConfig::default();
            let mut rest = args[3..].iter();
            while let Some(flag) = rest.next() {
                match (flag.as_str(), rest.next()) {
                    ("--rate", Some(v)) => match v.parse() {
                        Ok(r) => rate = r,
                        Err(_) => usage(&args[0]),
                    },
                    ("--config", Some(path)) => match PlayerConfig::from_json_file(path) {
                        Ok(c) => config = c,
                        Err(e) => {
                            eprintln!("Failed to load config: {}", e);
                            std::process::exit(1);
                        }
                    },
                    _ => usage(&args[0]),
                }
            }
            play(&input, rate, config)
        }
        "info" => info(&input),
        other => {
            eprintln!("Unknown command: {}", other);
            usage(&args[0]);
        }
    };
    std::process::exit(code);
}

fn play(input: &Path, rate: f64, config: PlayerConfig) -> i32 {
    let (done_tx, done_rx) = bounded::<bool>(1);

    let player = Player::create_with_config(
        input.to_string_lossy().into_owned(),
        config,
        move |p: &Player| {
            let snapshot = p.snapshot();
            match serde_json::to_string(&snapshot) {
                Ok(line) => println!("{}", line),
                Err(e) => eprintln!("Failed to encode status: {}", e),
            }
            if snapshot.status == PlaybackStatus::Stopped {
                let _ = done_tx.try_send(true);
            } else if snapshot.error.is_some() {
                let _ = done_tx.try_send(false);
            }
        },
    );

    let player = match player {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to create player: {}", e);
            return 1;
        }
    };

    player.set_rate(rate);
    player.play();

    // 就绪前收到的 play 会在就绪时生效，这里只需等待结束或出错
    let ok = done_rx.recv().unwrap_or(false);

    player.destroy();
    if ok {
        0
    } else {
        2
    }
}

fn info(input: &Path) -> i32 {
    match probe(input) {
        Ok(info) => {
            let json = serde_json::json!({
                "valid": true,
                "sample_rate": info.sample_rate,
                "channels": info.channels,
                "duration": info.duration.map(|d| d.as_secs()),
                "codec": info.codec,
            });
            println!("{}", json);
            0
        }
        Err(e) => {
            println!(
                "{}",
                serde_json::json!({ "valid": false, "error": e.to_string() })
            );
            1
        }
    }
}
