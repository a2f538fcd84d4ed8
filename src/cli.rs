use clap::{Args, Parser, Subcommand};
use jiff::civil::Date;
use std::path::PathBuf;

use crate::plot::TimeOfDay;

const EXAMPLES: &str = "\
for reading from a micro: noiselog -c '/usr/bin/arecord -r 8000 -f S16_LE -D hw:1,0'
for reading from a file:  noiselog -c '/bin/cat test.wav'
for plotting a day:       noiselog plot -a 06:00 -b 22:00 2024-07-01_out.csv";

#[derive(Parser, Debug)]
#[command(
    name = "noiselog",
    about = "Writes daily CSV files of averaged power spectra from a PCM audio stream",
    after_help = EXAMPLES,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub action: Option<Action>,

    /// Output directory [default: .]
    #[arg(short = 'd', long = "output-directory")]
    pub output_dir: Option<PathBuf>,

    /// Max. frequency in Hz [default: 100]
    #[arg(short = 'm', long = "mf")]
    pub max_freq: Option<u32>,

    /// Averaging interval in seconds [default: 60]
    #[arg(short = 'a', long = "ai")]
    pub avg_interval: Option<u32>,

    /// Read command producing a mono 8/16 bit WAV stream on stdout
    #[arg(short = 'c', long)]
    pub command: Option<String>,

    /// Output in dB
    #[arg(short = 'l', long)]
    pub db: bool,

    /// Write a daily wav file too
    #[arg(short = 'w', long)]
    pub wav: bool,

    /// Seconds to wait before restarting the read command [default: 5]
    #[arg(long)]
    pub retry_delay: Option<u64>,

    /// Settings file (TOML). Defaults to ./noiselog.toml or the user config dir
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Action {
    /// Render daily CSV logs as spectrogram images
    Plot(PlotArgs),
}

#[derive(Args, Debug)]
pub struct PlotArgs {
    /// CSV logs, or directories searched recursively for them
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory [default: next to each CSV file]
    #[arg(short = 'o', long = "odir")]
    pub out_dir: Option<PathBuf>,

    /// Start time of day (HH:MM)
    #[arg(short = 'a', long = "mintime", default_value = "00:00")]
    pub min_time: TimeOfDay,

    /// Stop time of day (HH:MM). Equal start and stop times keep the whole day
    #[arg(short = 'b', long = "maxtime", default_value = "24:00")]
    pub max_time: TimeOfDay,

    /// Lowest frequency in Hz
    #[arg(short = 'A', long = "minfreq", default_value_t = 0)]
    pub min_freq: u32,

    /// Highest frequency in Hz
    #[arg(short = 'B', long = "maxfreq", default_value_t = 1000)]
    pub max_freq: u32,

    /// Pixel rows per frequency
    #[arg(short = 'R', long = "aspectratio", default_value_t = 2.5)]
    pub aspect_ratio: f64,

    /// Distance of the frequency ticks in Hz
    #[arg(
        short = 'D',
        long = "freqdist",
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub freq_dist: u32,

    /// Downscale factor, 0..1
    #[arg(short = 's', long = "downscale", default_value_t = 1.0)]
    pub downscale: f64,

    /// dB threshold subtracted from every value. Without it, each frequency's
    /// noise floor is subtracted instead
    #[arg(short = 'O', long = "dboffset", allow_negative_numbers = true)]
    pub db_offset: Option<f64>,

    /// Upper limit of the colour scale in dB
    #[arg(short = 'm', long = "maxdb", default_value_t = 40.0)]
    pub max_db: f64,

    /// Scale factor (for unit changes)
    #[arg(short = 'S', long = "scale", default_value_t = 1.0, allow_negative_numbers = true)]
    pub scale: f64,

    /// Only take files from directories that were modified on or after this date (YYYY-MM-DD)
    #[arg(short = 'n', long = "newer")]
    pub newer: Option<Date>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn short_flags() {
        let cli = Cli::try_parse_from([
            "noiselog", "-d", "/tmp/out", "-m", "200", "-a", "30", "-c", "/bin/cat x.wav", "-l", "-w",
        ])
        .unwrap();
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cli.max_freq, Some(200));
        assert_eq!(cli.avg_interval, Some(30));
        assert_eq!(cli.command.as_deref(), Some("/bin/cat x.wav"));
        assert!(cli.db);
        assert!(cli.wav);
        assert!(cli.action.is_none());
    }

    #[test]
    fn plot_subcommand_defaults() {
        let cli = Cli::try_parse_from(["noiselog", "plot", "2024-07-01_out.csv"]).unwrap();
        let Some(Action::Plot(args)) = cli.action else {
            panic!("expected plot subcommand");
        };
        assert_eq!(args.inputs, [PathBuf::from("2024-07-01_out.csv")]);
        assert_eq!(args.min_time, "00:00".parse::<TimeOfDay>().unwrap());
        assert_eq!(args.max_time, "24:00".parse::<TimeOfDay>().unwrap());
        assert_eq!((args.min_freq, args.max_freq), (0, 1000));
        assert_eq!(args.freq_dist, 10);
        assert_eq!(args.db_offset, None);
        assert_eq!(args.max_db, 40.0);
        assert_eq!(args.newer, None);
    }

    #[test]
    fn plot_flags() {
        let cli = Cli::try_parse_from([
            "noiselog", "plot", "-a", "06:30", "-b", "18:00", "-A", "5", "-B", "50", "-O", "-10",
            "-S", "2", "-n", "2024-07-01", "-o", "/tmp/img", "logs",
        ])
        .unwrap();
        let Some(Action::Plot(args)) = cli.action else {
            panic!("expected plot subcommand");
        };
        assert_eq!(args.min_time, "06:30".parse::<TimeOfDay>().unwrap());
        assert_eq!((args.min_freq, args.max_freq), (5, 50));
        assert_eq!(args.db_offset, Some(-10.0));
        assert_eq!(args.scale, 2.0);
        assert_eq!(args.newer, Some(jiff::civil::date(2024, 7, 1)));
        assert_eq!(args.out_dir, Some(PathBuf::from("/tmp/img")));
    }

    #[test]
    fn plot_rejects_bad_times_and_monitor_flags() {
        assert!(Cli::try_parse_from(["noiselog", "plot", "-a", "25:00", "x.csv"]).is_err());
        assert!(Cli::try_parse_from(["noiselog", "plot", "-D", "0", "x.csv"]).is_err());
        assert!(Cli::try_parse_from(["noiselog", "plot"]).is_err());
        assert!(Cli::try_parse_from(["noiselog", "-w", "plot", "x.csv"]).is_err());
    }

    #[test]
    fn rejects_negative_numbers() {
        assert!(Cli::try_parse_from(["noiselog", "-a", "-5"]).is_err());
    }
}
