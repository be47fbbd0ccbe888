use anyhow::Result;
use retort::{Param, ParamType, Repl, ReplConfig, Stop, Value};
use tracing_subscriber::EnvFilter;

const FOO_CANDIDATES: [&str; 4] = ["ddd", "bbb", "aaa", "abba"];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = ReplConfig::default().banner("retort demo, type 'exit' or press Ctrl-D to leave");
    let mut repl = Repl::new(config)?;

    let printer = repl.printer().clone();
    repl.command("foo")
        .description("print both arguments")
        .params([Param::untyped("x"), Param::untyped("y")])
        .register(move |args| {
            printer.info(["foo executed with", args.str(0)?, args.str(1)?]);
            Ok(Value::None)
        })?;
    repl.complete("foo", |text, _, _, _| {
        FOO_CANDIDATES
            .iter()
            .filter(|candidate| candidate.starts_with(text))
            .map(|candidate| candidate.to_string())
            .collect()
    })?;

    let printer = repl.printer().clone();
    repl.command("bar").register(move |_| {
        printer.info(["bar executed"]);
        Ok(Value::None)
    })?;

    let printer = repl.printer().clone();
    repl.command("add")
        .description("add two integers")
        .params([Param::new("a", ParamType::Int), Param::new("b", ParamType::Int)])
        .register(move |args| {
            let sum = args
                .int(0)?
                .checked_add(args.int(1)?)
                .ok_or_else(|| anyhow::anyhow!("integer overflow"))?;
            printer.success([sum]);
            Ok(Value::Int(sum))
        })?;

    let printer = repl.printer().clone();
    repl.command("echo")
        .description("print the arguments back")
        .param(Param::untyped("words").variadic())
        .register(move |args| {
            printer.print(args.iter());
            Ok(Value::None)
        })?;

    repl.command("exit")
        .description("leave the shell")
        .register(|_| Err(Stop::default().into()))?;

    repl.parse_cli_arguments();
    repl.run();
    Ok(())
}
