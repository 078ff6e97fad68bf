//! `docassist init` - Write a default config file.

use docassist_config::AppConfig;

pub fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    std::fs::create_dir_all(&config_dir)?;

    if config_path.exists() && !force {
        println!("  Config already exists: {}", config_path.display());
        println!("  Use --force to overwrite it.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("  Wrote {}", config_path.display());
    println!();
    println!("  Next steps:");
    println!("    1. Set DOCASSIST_API_KEY (or GEMINI_API_KEY)");
    println!("    2. Point retrieval.docs_dir at your documentation");
    println!("    3. docassist ask \"How do I get started?\"");

    Ok(())
}
