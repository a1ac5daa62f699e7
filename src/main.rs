use std::path::PathBuf;
use std::process::ExitCode;

use agl_grammar::logging;
use agl_grammar::utils::{parse_symbols, render_tokens};
use agl_grammar::{
    Grammar, GrammarConfig, GrammarSearch, PatternGrammar, RegularGrammar, SearchOutcome,
};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::error;

/// Hidden grammars for artificial grammar learning experiments
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file; missing fields take their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Kind of grammar
    #[arg(short, long, global = true, value_enum, default_value_t = Kind::Regular)]
    kind: Kind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Regular,
    Pattern,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for a grammar and print it with a set of stimuli
    Generate {
        /// Symbols to build strings from, e.g. "M,R,S,V,X"
        #[arg(short, long)]
        symbols: Option<String>,

        /// Display words for the symbols, in alphabet order
        #[arg(short, long, value_delimiter = ',')]
        tokens: Vec<String>,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Judge strings against an obfuscated grammar
    Recognize {
        /// The obfuscated grammar
        grammar: String,

        /// Strings to judge
        #[arg(required = true)]
        strings: Vec<String>,
    },
    /// Decode an obfuscated grammar and print its rules
    Reveal {
        /// The obfuscated grammar
        grammar: String,
    },
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        eprintln!("failed to initialize logging: {}", err);
        return ExitCode::FAILURE;
    }

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => GrammarConfig::from_json_file(path)?,
        None => GrammarConfig::default(),
    };

    match cli.command {
        Commands::Generate {
            symbols,
            tokens,
            seed,
        } => {
            if let Some(symbols) = symbols {
                config.symbols = parse_symbols(&symbols)?;
            }
            config.validate()?;
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            match cli.kind {
                Kind::Regular => generate(RegularGrammar::with_config(config), &tokens, &mut rng),
                Kind::Pattern => generate(PatternGrammar::with_config(config), &tokens, &mut rng),
            }
        }
        Commands::Recognize { grammar, strings } => match cli.kind {
            Kind::Regular => recognize(&RegularGrammar::from_obfuscated_repr(&grammar)?, &strings),
            Kind::Pattern => recognize(&PatternGrammar::from_obfuscated_repr(&grammar)?, &strings),
        },
        Commands::Reveal { grammar } => {
            match cli.kind {
                Kind::Regular => println!("{}", RegularGrammar::from_obfuscated_repr(&grammar)?),
                Kind::Pattern => println!("{}", PatternGrammar::from_obfuscated_repr(&grammar)?),
            }
            Ok(())
        }
    }
}

fn generate<G: Grammar>(
    mut grammar: G,
    tokens: &[String],
    rng: &mut StdRng,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = grammar.config().clone();
    let search = GrammarSearch::from_config(&config);

    println!("Looking for a suitable random grammar...");
    let strings = match search.run(&mut grammar, rng) {
        SearchOutcome::Found { strings, .. } => strings,
        SearchOutcome::NotFound { .. } => {
            return Err(
                "no grammar found that would satisfy the current settings, try relaxing them"
                    .into(),
            );
        }
    };

    let ungrammatical = grammar.produce_ungrammatical_with(
        rng,
        config.test_strings_ungrammatical,
        config.min_string_length,
        config.max_string_length,
    );
    if ungrammatical.len() < config.test_strings_ungrammatical {
        return Err(format!(
            "grammar yielded only {} of {} ungrammatical strings",
            ungrammatical.len(),
            config.test_strings_ungrammatical
        )
        .into());
    }

    let show = |s: &String| {
        if tokens.is_empty() {
            s.clone()
        } else {
            render_tokens(s, grammar.alphabet(), tokens)
        }
    };

    let mut grammatical: Vec<&String> = strings.iter().collect();
    grammatical.sort();
    let mut ungrammatical: Vec<&String> = ungrammatical.iter().collect();
    ungrammatical.sort();

    println!("Grammar: {}", grammar.obfuscated_repr_with(rng)?);
    println!("\nGrammatical strings:");
    for (i, s) in grammatical.into_iter().enumerate() {
        println!("{}. {}", i + 1, show(s));
    }
    println!("\nUngrammatical strings:");
    for (i, s) in ungrammatical.into_iter().enumerate() {
        println!("{}. {}", i + 1, show(s));
    }
    Ok(())
}

fn recognize<G: Grammar>(grammar: &G, strings: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    for s in strings {
        let verdict = if grammar.recognize(s) { "grammatical" } else { "ungrammatical" };
        println!("{}\t{}", s, verdict);
    }
    Ok(())
}
