use time::macros::format_description;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command};

/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug output.
pub fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let timer = LocalTime::new(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_target(false)
        .init();
}

pub fn format_number(num: u64) -> String {
    let digits = num.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn validate_args(args: &Args) -> anyhow::Result<()> {
    match &args.command {
        Command::Fetch(fetch) => {
            if let Some(workers) = fetch.workers {
                if workers == 0 {
                    anyhow::bail!("--workers must be greater than 0");
                }
            }

            if let Some(end) = fetch.end {
                if end < fetch.start {
                    anyhow::bail!("--end {} is before --start {}", end, fetch.start);
                }
            }

            if fetch.region.trim().is_empty() {
                anyhow::bail!("--region must not be empty");
            }
        }
        Command::DoublingAt(doubling) => {
            if doubling.date <= doubling.since {
                anyhow::bail!("--date {} must be after --since {}", doubling.date, doubling.since);
            }

            if let Some(until) = doubling.until {
                if until < doubling.date {
                    anyhow::bail!("--until {} is before --date {}", until, doubling.date);
                }
            }

            if doubling.region.trim().is_empty() {
                anyhow::bail!("--region must not be empty");
            }
        }
        Command::Analyze(analyze) => {
            if analyze.tail == 0 {
                anyhow::bail!("--tail must be greater than 0");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn formats_thousands() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn rejects_reversed_dates_and_zero_workers() {
        let reversed = Args::try_parse_from([
            "releasedates",
            "fetch",
            "--start",
            "2020-02-01",
            "--end",
            "2020-01-01",
            "--api-key",
            "k",
        ])
        .unwrap();
        assert!(validate_args(&reversed).is_err());

        let no_workers = Args::try_parse_from([
            "releasedates",
            "fetch",
            "--start",
            "2020-01-01",
            "--workers",
            "0",
            "--api-key",
            "k",
        ])
        .unwrap();
        assert!(validate_args(&no_workers).is_err());

        let zero_tail = Args::try_parse_from(["releasedates", "analyze", "--tail", "0"]).unwrap();
        assert!(validate_args(&zero_tail).is_err());

        let before_since = Args::try_parse_from([
            "releasedates",
            "doubling-at",
            "--date",
            "1870-01-01",
            "--api-key",
            "k",
        ])
        .unwrap();
        assert!(validate_args(&before_since).is_err());
    }
}
