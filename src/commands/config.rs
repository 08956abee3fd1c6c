use crate::StatediffContext;
use crate::config::Config;
use crate::config::validator::ConfigValidator;
use crate::output;
use anyhow::{Result, bail};

/// Print the effective configuration
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn show(ctx: &StatediffContext) -> Result<()> {
    output::info(&format!("# {}", ctx.config_path.display()));
    print!("{}", ctx.config.to_toml()?);
    Ok(())
}

/// Check the configuration file and the scan settings it produces
///
/// # Errors
///
/// Returns an error describing the first unusable setting.
pub fn validate(ctx: &StatediffContext) -> Result<()> {
    ConfigValidator::new().validate_config_file(&ctx.config_path)?;
    ConfigValidator::validate_for_scan(&ctx.config)?;
    output::success("Configuration is valid");
    Ok(())
}

/// Write the default configuration
///
/// # Errors
///
/// Returns an error if the file exists and `force` is not set, or it cannot
/// be written.
pub fn init(ctx: &StatediffContext, force: bool) -> Result<()> {
    if ctx.config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            ctx.config_path.display()
        );
    }
    Config::default().save(&ctx.config_path)?;
    output::success(&format!("Wrote {}", ctx.config_path.display()));
    Ok(())
}
