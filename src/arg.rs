use std::path::PathBuf;

use clap::{
    value_parser,
    Arg,
    ArgMatches,
    Command,
};

/// Settings given on the command line. These override the configuration
/// file where they overlap.
pub struct Settings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dir: PathBuf,
    pub config: Option<PathBuf>,
}

const DATA_DIR: &str = ".";

impl Settings {

    pub fn new() -> Settings {
        Settings {
            host: None,
            port: None,
            dir: PathBuf::from(DATA_DIR),
            config: None,
        }
    }

    fn bind_from_args(&mut self, arg: &ArgMatches) {
        match arg.get_one::<String>("host") {
            Some(v) => {
                self.host = Some(v.clone());
            },
            _ => {},
        };

        match arg.get_one::<u16>("port") {
            Some(v) => {
                self.port = Some(*v);
            },
            _ => {},
        };

        match arg.get_one::<String>("datadir") {
            Some(v) => {
                self.dir = PathBuf::from(v);
            },
            _ => {},
        };

        match arg.get_one::<String>("config") {
            Some(v) => {
                self.config = Some(PathBuf::from(v));
            },
            _ => {},
        };
    }

    pub fn from_args() -> Settings {
        let mut o = Command::new("kiste");
        o = o.version(env!("CARGO_PKG_VERSION"));
        o = o.arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host or ip to bind server to")
                );
        o = o.arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Port to bind server to")
                );
        o = o.arg(
            Arg::new("datadir")
                .long("data-dir")
                .short('d')
                .value_name("DIR")
                .help("Directory to keep the content under")
                );
        o = o.arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Configuration file")
                );

        let arg_matches = o.get_matches();
        let mut settings = Settings::new();
        settings.bind_from_args(&arg_matches);
        settings
    }
}
