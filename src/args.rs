use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file (created with defaults if missing)
    #[arg(long, default_value = "config.json")]
    pub config: String,

    /// Camera index, overrides camera.index
    #[arg(short, long)]
    pub cam_index: Option<u32>,

    /// Serial port of the hand controller, overrides serial.port
    #[arg(short, long)]
    pub port: Option<String>,

    /// Run without camera or detector, using a simulated hand
    #[arg(long, default_value_t = false)]
    pub simulate: bool,

    /// List available serial ports
    #[arg(long)]
    pub list_ports: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overrides() {
        let args = Args::parse_from(["rusty_hand", "--port", "/dev/ttyUSB0", "--simulate", "-c", "2"]);
        assert_eq!(args.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(args.cam_index, Some(2));
        assert!(args.simulate);
        assert_eq!(args.config, "config.json");
    }
}
