use sitegraph::{EXIT_OK, command_argument_builder, handle_crawl, parse_error_exit_code};

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = match cmd.try_get_matches() {
        Ok(matches) => matches,
        Err(err) => {
            let _ = err.print();
            std::process::exit(parse_error_exit_code(&err));
        }
    };

    let code = match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if code != EXIT_OK {
        std::process::exit(code);
    }
}
