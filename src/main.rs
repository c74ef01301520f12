use anyhow::{bail, Result};
use hospital_bulk::{logger, App, Config};
use std::path::PathBuf;

const USAGE: &str = "用法: hospital_bulk <file.csv> [--validate-only]";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logger::init_with_verbose(config.verbose_logging);

    let mut csv_path: Option<PathBuf> = None;
    let mut validate_only = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--validate-only" => validate_only = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            _ if csv_path.is_none() => csv_path = Some(PathBuf::from(arg)),
            _ => bail!("多余的参数: {}\n{}", arg, USAGE),
        }
    }

    let Some(csv_path) = csv_path else {
        bail!("{}", USAGE);
    };

    let is_csv = csv_path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        bail!("Only CSV files are allowed");
    }

    // 初始化并运行应用
    let app = App::initialize(config)?;
    if validate_only {
        app.validate(&csv_path).await
    } else {
        app.run(&csv_path).await
    }
}
