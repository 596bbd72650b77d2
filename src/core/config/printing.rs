use crate::core::config::data::Config;

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  server-url: {}", self.server_url());
        match &self.default_model {
            Some(model) => println!("  default-model: {model}"),
            None => println!("  default-model: (unset)"),
        }
        match self.cursor.unwrap_or(true) {
            true => println!("  cursor: on"),
            false => println!("  cursor: off"),
        }
        match self.code_block_style() {
            crate::render::CodeBlockStyle::Inline => println!("  code-style: inline"),
            crate::render::CodeBlockStyle::Component => println!("  code-style: component"),
        }
        let renderer = self.renderer_options();
        println!("  blink-interval: {}ms", renderer.blink_interval.as_millis());
        let driver = self.driver_options();
        println!("  scroll-throttle: {}ms", driver.scroll_throttle.as_millis());
        println!("  engine-max-attempts: {}", self.retry_policy().max_attempts);
        if self.custom_providers.is_empty() {
            println!("  custom-providers: (none set)");
        } else {
            println!("  custom-providers:");
            for provider in &self.custom_providers {
                println!("    {} ({})", provider.model, provider.provider);
            }
        }
    }
}
