use clap::{ArgAction, Parser, Subcommand};

#[allow(clippy::upper_case_acronyms)]
#[derive(Parser, Debug)]
#[clap(name = "fuelwatch", about, version)]
pub struct CLI {
    #[clap(subcommand)]
    pub command: Commands,

    /// Increase log output, `-v` for debug and `-vv` for trace.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Parser, Debug)]
#[clap(about = "Scrapes NZ fuel prices from gaspy.nz into postgres or csv", long_about = None)]
pub enum Commands {
    /// Sets up a fuelwatch project.
    ///
    /// Writes a starter fuelwatch.yaml when none exists, otherwise creates the
    /// postgres tables and csv directory the manifest asks for.
    ///
    /// Example:
    /// `fuelwatch init`
    #[clap(name = "init")]
    Init {
        /// optional - The path to run the command in, default will be where the command is run.
        #[clap(long, short)]
        path: Option<String>,
    },

    /// Manage the stations prices are scraped for.
    ///
    /// Example:
    /// `fuelwatch stations import`
    #[clap(name = "stations")]
    Stations {
        #[clap(subcommand)]
        subcommand: StationsSubcommands,

        /// optional - The path to run the command in, default will be where the command is run.
        #[clap(long, short)]
        path: Option<String>,
    },

    /// Scrapes the latest prices of every stored station and stores them.
    ///
    /// Example:
    /// `fuelwatch scrape`
    #[clap(name = "scrape")]
    Scrape {
        /// optional - The path to run the command in, default will be where the command is run.
        #[clap(long, short)]
        path: Option<String>,
    },

    /// Read prices back out of postgres.
    ///
    /// Example:
    /// `fuelwatch prices latest --fuel-type 91`
    #[clap(name = "prices")]
    Prices {
        #[clap(subcommand)]
        subcommand: PricesSubcommands,

        /// optional - The path to run the command in, default will be where the command is run.
        #[clap(long, short)]
        path: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum StationsSubcommands {
    /// Imports stations from captured map responses.
    ///
    /// Reads `<captures_path>/<city>/<query>.json`, stores stations not seen before
    /// and records the largest station count per query for scraping.
    ///
    /// Example:
    /// `fuelwatch stations import`
    #[clap(name = "import")]
    Import,
}

#[derive(Subcommand, Debug)]
pub enum PricesSubcommands {
    /// Most recent price of every station for one fuel type.
    ///
    /// Example:
    /// `fuelwatch prices latest --fuel-type 91`
    #[clap(name = "latest")]
    Latest {
        #[arg(long)]
        fuel_type: String,
    },

    /// Every recorded price of one station.
    ///
    /// Example:
    /// `fuelwatch prices history --station <STATION_ID>`
    #[clap(name = "history")]
    History {
        #[arg(long)]
        station: String,
    },

    /// Fuel types with at least one stored price.
    ///
    /// Example:
    /// `fuelwatch prices fuel-types`
    #[clap(name = "fuel-types")]
    FuelTypes,
}
