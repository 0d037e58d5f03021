//! Config command handler

use super::resolve_config;
use crate::commands::{ConfigArgs, ConfigFormat};
use crate::error::CliResult;
use boh_probe::ProbeConfig;

/// Render the masked configuration
pub fn render_config(config: &ProbeConfig, format: ConfigFormat) -> CliResult<String> {
    let masked = config.masked();
    let text = match format {
        ConfigFormat::Yaml => serde_yaml_ng::to_string(&masked)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&masked)?,
    };
    Ok(text)
}

/// Short overview printed without `--show`
#[must_use]
pub fn render_overview(config: &ProbeConfig) -> String {
    let profile = &config.profile;
    format!(
        "Environment: {}\nLogin page:  {}\nOrder page:  {}\nAccount:     {}\nHeadless:    {}",
        profile.environment,
        profile.login_url,
        config.order_page_url(),
        profile.credentials.account_hint(),
        config.browser.headless
    )
}

/// Execute the config command
pub fn execute_config(args: &ConfigArgs) -> CliResult<()> {
    let config = resolve_config(&args.target)?;
    if args.show {
        println!("{}", render_config(&config, args.format)?.trim_end());
    } else {
        println!("{}", render_overview(&config));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_masks_password() {
        let text = render_config(&ProbeConfig::default(), ConfigFormat::Yaml).unwrap();
        assert!(!text.contains("admin@123"));
        assert!(text.contains("'***'") || text.contains("\"***\""), "{text}");
    }

    #[test]
    fn test_json_masks_password() {
        let text = render_config(&ProbeConfig::default(), ConfigFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["profile"]["credentials"]["password"], "***");
        assert_eq!(value["profile"]["environment"], "test");
    }

    #[test]
    fn test_overview_hides_account() {
        let text = render_overview(&ProbeConfig::default());
        assert!(text.contains("Account:     adm***"));
        assert!(text.contains("https://saas-boh-qa.example/store-supply/demand-daily"));
    }
}
