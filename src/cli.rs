//! Command-line argument parsing.

use std::path::PathBuf;

use adorapet::app::LaunchConfig;
use adorapet::{PetConfig, PetContext};
use clap::Parser;

/// Animated desktop companions.
#[derive(Parser, Debug, Clone)]
#[command(name = "adorapet")]
#[command(about = "Sprite-sheet pets that wander over the desktop")]
#[command(version)]
pub struct Cli {
    /// Pet description to spawn. Repeat for several pets; the built-in cat
    /// is used when none is given.
    #[arg(long = "pet", value_name = "FILE")]
    pub pets: Vec<PathBuf>,

    /// Window width in pixels.
    #[arg(long, default_value_t = 800.0)]
    pub width: f32,

    /// Window height in pixels.
    #[arg(long, default_value_t = 600.0)]
    pub height: f32,

    /// Directory sheet images are loaded from.
    #[arg(long, default_value = "assets")]
    pub assets: String,

    /// Log filter handed to bevy's LogPlugin.
    #[arg(long, default_value = "wgpu=error,naga=warn,adorapet=info")]
    pub log_filter: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Load every pet file and assemble the app resource.
    pub fn launch_config(&self) -> adorapet::Result<LaunchConfig> {
        let pets = if self.pets.is_empty() {
            vec![PetConfig::builtin()?]
        } else {
            self.pets
                .iter()
                .map(PetConfig::load)
                .collect::<adorapet::Result<Vec<_>>>()?
        };
        Ok(LaunchConfig {
            pets,
            width: self.width,
            height: self.height,
            assets: self.assets.clone(),
            log_filter: self.log_filter.clone(),
            context: PetContext::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cli = Cli::parse_from(["adorapet"]);
        assert!(cli.pets.is_empty());
        assert_eq!(cli.width, 800.0);
        assert_eq!(cli.assets, "assets");

        let launch = cli.launch_config().unwrap();
        assert_eq!(launch.pets.len(), 1);
        assert_eq!(launch.pets[0].name, "cat");
    }

    #[test]
    fn test_repeated_pets() {
        let cli = Cli::parse_from([
            "adorapet", "--pet", "a.json", "--pet", "b.json", "--width", "1024",
        ]);
        assert_eq!(cli.pets, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert_eq!(cli.width, 1024.0);
    }

    #[test]
    fn test_missing_pet_file() {
        let cli = Cli::parse_from(["adorapet", "--pet", "/nonexistent/pet.json"]);
        assert!(matches!(cli.launch_config(), Err(adorapet::Error::Io(_))));
    }
}
