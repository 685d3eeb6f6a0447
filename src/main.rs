use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::info;

use rtsmotion::logging::{init_logging, level_for_verbosity, parse_log_level, LogConfig};
use rtsmotion::scenario::ScenarioConfig;
use rtsmotion::simulation::SimulationEngine;

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("rtsmotion")
        .version("0.1.0")
        .about("RTS移動シミュレーション (RTS Motion)")
        .long_about("加減速ランプで制御される軽量艦とRTSカメラの移動シミュレーション\n\
                     シナリオに記述した目標指示とカメラ入力を時刻順に再生します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .conflicts_with("demo"),
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .action(ArgAction::SetTrue)
                .help("組み込みのデモシナリオを実行"),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了"),
        )
        .arg(
            Arg::new("events-out")
                .short('e')
                .long("events-out")
                .value_name("FILE")
                .help("到着通知の記録をYAMLで保存"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("OUTPUT")
                .help("ログ出力先 (console, file, both)"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .help("ログファイルの出力ディレクトリ"),
        )
        .get_matches();

    println!("RTS移動シミュレーション (RTS Motion) - rtsmotion v0.1.0");
    println!();

    let scenario = if matches.get_flag("demo") {
        ScenarioConfig::demo()
    } else if let Some(path) = matches.get_one::<String>("scenario") {
        ScenarioConfig::from_file(path)
    } else {
        show_default_help();
        return;
    };

    let scenario = match scenario {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };

    if matches.get_flag("info") {
        scenario.print_summary();
        return;
    }

    let verbose_level = matches.get_count("verbose");
    let log_config = log_config_from_args(&matches, &scenario, verbose_level);
    let _guard = match init_logging(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = execute_scenario(scenario, verbose_level, matches.get_one::<String>("events-out")) {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

/// シナリオの `logging:` セクションにコマンドライン引数を重ねる
fn log_config_from_args(matches: &ArgMatches, scenario: &ScenarioConfig, verbose_level: u8) -> LogConfig {
    let mut config = LogConfig::from_section(&scenario.logging);

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.level = parse_log_level(level);
    } else if let Some(level) = level_for_verbosity(verbose_level) {
        config.level = level;
    }

    if let Some(output) = matches.get_one::<String>("log-output") {
        match output.parse() {
            Ok(output) => config.output = output,
            Err(e) => eprintln!("警告: {}", e),
        }
    }

    if let Some(dir) = matches.get_one::<String>("log-dir") {
        config.log_dir = dir.clone();
    }

    config
}

/// シナリオの実行
fn execute_scenario(
    scenario: ScenarioConfig,
    verbose_level: u8,
    events_out: Option<&String>,
) -> Result<(), Box<dyn std::error::Error>> {
    scenario.print_summary();
    println!();

    if verbose_level > 0 {
        println!("シミュレーション設定:");
        println!("  固定時間刻み: {:.3}秒", scenario.sim.fixed_dt_s);
        println!("  フレーム時間刻み: {:.3}秒", scenario.sim.frame_dt_s);
        println!("  最大時間: {:.1}秒", scenario.sim.t_max_s);
        println!();
    }

    let mut simulation = SimulationEngine::new(scenario, verbose_level);
    simulation.initialize()?;
    let summary = simulation.run()?;

    println!();
    summary.print();

    if let Some(path) = events_out {
        simulation.save_events(path)?;
        println!("到着通知を保存しました: {}", path);
    }

    info!("シナリオ実行が正常に完了しました");
    Ok(())
}

/// デフォルトヘルプを表示
fn show_default_help() {
    println!("使用方法:");
    println!("  rtsmotion [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>    シナリオファイルを指定して実行");
    println!("      --demo               組み込みデモシナリオを実行");
    println!("  -i, --info               シナリオ情報のみ表示");
    println!("  -e, --events-out <FILE>  到着通知の記録を保存");
    println!("  -v, --verbose            詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-level <LEVEL>  ログレベル");
    println!("      --log-output <OUT>   ログ出力先 (console, file, both)");
    println!("      --log-dir <DIR>      ログ出力ディレクトリ");
    println!("  -h, --help               このヘルプを表示");
    println!();
    println!("例:");
    println!("  rtsmotion --demo");
    println!("  rtsmotion -s scenarios/demo.yaml -v");
    println!("  rtsmotion -s scenarios/demo.yaml -i");
    println!("  rtsmotion --demo -e out/arrivals.yaml --log-output console");
}
