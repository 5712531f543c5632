use clap::{Parser, Subcommand};

use progressdw::{
    ChapterRow, ExecutorRow, Interval, MetricMode, ProgressDW, ReportConfig, SeriesRow,
};

#[derive(Parser)]
#[command(name = "progressdw", about = "Construction progress reporting CLI")]
struct Cli {
    /// Database path (default: ~/.progressdw/progressdw.db)
    #[arg(long)]
    db: Option<String>,

    /// Hours of tracked work per ton of planned mass (default: 3.0)
    #[arg(long)]
    hours_per_ton: Option<f64>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Date-keyed chart series for a title
    Series {
        /// Title id
        title_id: i64,
        /// Metric mode: mass or drawings
        #[arg(long, default_value = "mass")]
        mode: String,
        /// Bucketing interval: day, week or month
        #[arg(long, default_value = "day")]
        interval: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Output as CSV
        #[arg(long)]
        csv: bool,
    },
    /// Per-executor rollup for a title
    Executors {
        /// Title id
        title_id: i64,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        csv: bool,
    },
    /// Per-chapter time breakdown for a title
    Chapters {
        /// Title id
        title_id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Completed mass against the planned target
    Progress {
        /// Title id
        title_id: i64,
        /// Target mass in tons (overrides the stored target when larger)
        #[arg(long)]
        target: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// List projects
    Projects {
        #[arg(long)]
        json: bool,
    },
    /// List titles of a project
    Titles {
        /// Project id
        project_id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Show store status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = ReportConfig::new(cli.db.map(Into::into), cli.hours_per_ton)?;
    let dw = ProgressDW::connect(config).await?;

    match cli.command {
        Commands::Series {
            title_id,
            mode,
            interval,
            json,
            csv,
        } => {
            let mode: MetricMode = mode.parse()?;
            let interval: Interval = interval.parse()?;
            let rows = dw.series(title_id, mode, interval).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if csv {
                print!("{}", series_csv(&rows));
            } else {
                print_series(&rows, mode);
            }
        }
        Commands::Executors { title_id, json, csv } => {
            let rows = dw.executors(title_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if csv {
                print!("{}", executors_csv(&rows));
            } else {
                print_executors(&rows);
            }
        }
        Commands::Chapters { title_id, json } => {
            let rows = dw.chapters(title_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print_chapters(&rows);
            }
        }
        Commands::Progress {
            title_id,
            target,
            json,
        } => {
            let progress = dw.progress(title_id, target).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&progress)?);
            } else {
                println!(
                    "Completed: {:.2} t  Progress: {:.1}%",
                    progress.completed_tons, progress.percent
                );
            }
        }
        Commands::Projects { json } => {
            let projects = dw.projects().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else {
                for p in &projects {
                    println!("{:>6}  {}", p.id, p.name);
                }
            }
        }
        Commands::Titles { project_id, json } => {
            let titles = dw.titles(project_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&titles)?);
            } else {
                for t in &titles {
                    println!("{:>6}  {}", t.id, t.name);
                }
            }
        }
        Commands::Status => {
            let counts = dw.status().await?;
            println!("{:<20} rows", "table");
            for (table, count) in &counts {
                println!("{table:<20} {count}");
            }
        }
    }

    Ok(())
}

fn print_series(rows: &[SeriesRow], mode: MetricMode) {
    match mode {
        MetricMode::Mass => {
            println!(
                "{:<12} {:>10} {:>12} {:>10} {:>10}",
                "date", "mass_t", "planned_t", "cplx", "hours"
            );
            for row in rows {
                println!(
                    "{:<12} {:>10.2} {:>12.2} {:>10.2} {:>10.1}",
                    row.date, row.total_mass, row.planned_mass, row.complexity, row.total_hours
                );
            }
        }
        MetricMode::Drawings => {
            println!(
                "{:<12} {:>10} {:>10} {:>10}",
                "date", "drawings", "cplx", "mass_t"
            );
            for row in rows {
                println!(
                    "{:<12} {:>10} {:>10.2} {:>10.2}",
                    row.date, row.total_drawings, row.complexity, row.total_mass
                );
            }
        }
    }
}

fn print_executors(rows: &[ExecutorRow]) {
    println!(
        "{:<24} {:>8} {:>8} {:>8} {:>6} {:>8} {:>8} {:>8} {:>6}",
        "name", "mass_t", "hours", "plan_t", "drw", "drw_cplx", "drw_t", "tekla_h", "tk%"
    );
    for row in rows {
        println!(
            "{:<24} {:>8.2} {:>8.1} {:>8.2} {:>6} {:>8.2} {:>8.2} {:>8.1} {:>6.1}",
            row.name,
            row.total_mass_modeling,
            row.total_hours,
            row.planned_mass,
            row.completed_drawings,
            row.total_complexity_drawing,
            row.total_mass_drawing,
            row.tekla_hours,
            row.tekla_percentage,
        );
    }
}

fn print_chapters(rows: &[ChapterRow]) {
    println!("{:<24} {:>10} {:>8}", "chapter", "hours", "share%");
    for row in rows {
        println!(
            "{:<24} {:>10.1} {:>8.1}",
            row.chapter_name, row.total_time, row.percentage
        );
    }
}

fn series_csv(rows: &[SeriesRow]) -> String {
    let mut out = String::new();
    out.push_str("date,total_mass,planned_mass,complexity,total_drawings,total_hours\n");
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            row.date,
            row.total_mass,
            row.planned_mass,
            row.complexity,
            row.total_drawings,
            row.total_hours,
        ));
    }
    out
}

fn executors_csv(rows: &[ExecutorRow]) -> String {
    let mut out = String::new();
    out.push_str(
        "name,total_mass_modeling,total_hours,planned_mass,completed_drawings,\
         total_complexity_drawing,total_mass_drawing,tekla_hours,tekla_percentage\n",
    );
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{}\n",
            csv_escape(&row.name),
            row.total_mass_modeling,
            row.total_hours,
            row.planned_mass,
            row.completed_drawings,
            row.total_complexity_drawing,
            row.total_mass_drawing,
            row.tekla_hours,
            row.tekla_percentage,
        ));
    }
    out
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
