//! Command-line interface.
//!
//! Parsing never exits on its own: usage errors come back as
//! [`clap::Error`] so `main` can choose the exit status.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// Plays a named playlist until interrupted
#[derive(Debug, Parser)]
#[command(name = "jukebox", author, version, about, long_about = None)]
pub struct Cli {
    /// Account username
    #[arg(short, long, required_unless_present = "list_devices")]
    pub username: Option<String>,

    /// Account password (or set JUKEBOX_PASSWORD)
    #[arg(
        short,
        long,
        env = "JUKEBOX_PASSWORD",
        hide_env_values = true,
        required_unless_present = "list_devices"
    )]
    pub password: Option<String>,

    /// Name of the playlist to play (case-insensitive)
    #[arg(short = 'l', long = "list", required_unless_present = "list_devices")]
    pub playlist: Option<String>,

    /// Delete tracks from the playlist once they have played
    #[arg(short, long)]
    pub delete_played: bool,

    /// Config file (default: OS config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Library manifest to serve playlists from
    #[arg(long)]
    pub library: Option<PathBuf>,

    /// Output device name
    #[arg(long)]
    pub device: Option<String>,

    /// Print the available output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

/// Credentials and target for a playback session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionArgs {
    pub username: String,
    pub password: String,
    pub playlist: String,
}

impl Cli {
    /// Flags that override the config file.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.audio.output_device = device.clone();
        }
        if let Some(library) = &self.library {
            config.library.manifest = Some(library.clone());
        }
    }

    /// Session arguments, present unless `--list-devices` was given.
    pub fn session(&self) -> Option<SessionArgs> {
        Some(SessionArgs {
            username: self.username.clone()?,
            password: self.password.clone()?,
            playlist: self.playlist.clone()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("jukebox").chain(args.iter().copied()))
    }

    #[test]
    fn test_full_session_args() {
        let cli = parse(&["-u", "alice", "-p", "secret", "-l", "Party", "-d"]).unwrap();
        assert!(cli.delete_played);
        assert_eq!(
            cli.session(),
            Some(SessionArgs {
                username: "alice".into(),
                password: "secret".into(),
                playlist: "Party".into(),
            })
        );
    }

    #[test]
    fn test_missing_playlist_is_usage_error() {
        let err = parse(&["-u", "alice", "-p", "secret"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_list_devices_needs_nothing_else() {
        let cli = parse(&["--list-devices"]).unwrap();
        assert!(cli.list_devices);
        assert_eq!(cli.session(), None);
    }

    #[test]
    fn test_help_is_not_a_failure() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let cli = parse(&[
            "-u", "a", "-p", "b", "-l", "c", "--device", "USB", "--library", "/srv/lib.toml",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply_to(&mut config);
        assert_eq!(config.audio.output_device, "USB");
        assert_eq!(
            config.library.manifest,
            Some(PathBuf::from("/srv/lib.toml"))
        );
    }
}
