// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

#[allow(unused)]
use log::{Level, log_enabled, trace, debug, info, warn, error};

use rustyline::Editor;
use rustyline::error::ReadlineError;

use qdsp::{Q, Dsp16, Dsp32, Result};
use qdsp::dsp::operators;

const HISTORY_FILE : &str = ".qdsp-shell-history";

// ================================================================================
// Shell commands

#[derive(Clone, Copy, PartialEq, Debug)]
enum Format {
    Q15,
    Q31,
}

enum Op {
    System(fn(&mut Shell)),
    Unary(fn(Dsp16) -> Dsp16, fn(Dsp32) -> Dsp32),
    Binary(fn(Dsp16, Dsp16) -> Dsp16, fn(Dsp32, Dsp32) -> Dsp32),
}

enum CmdInfo {
    Cmd(Command),
    Section(&'static str),
}

struct Command {
    n : &'static str,
    d : &'static str,
    op : Op,
}

impl Command {
    pub fn len(&self) -> usize {
	return self.n.len();
    }

    pub fn matches(&self, s : &'_ str) -> bool {
	return s == self.n;
    }

    pub fn arity(&self) -> usize {
	return match self.op {
	    Op::System(_)    => 0,
	    Op::Unary(..)    => 1,
	    Op::Binary(..)   => 2,
	};
    }
}

static COMMANDS : [CmdInfo; 23] = [
    CmdInfo::Section("System commands"),
    CmdInfo::Cmd(Command { n : "help", op : Op::System(cmd_help), d : "Print basic introductory help" }),
    CmdInfo::Cmd(Command { n : "list", op : Op::System(cmd_list), d : "List all commands" }),
    CmdInfo::Cmd(Command { n : "quit", op : Op::System(cmd_quit), d : "Quit the shell" }),

    CmdInfo::Section("Number format"),
    CmdInfo::Cmd(Command { n : "q15", op : Op::System(cmd_q15), d : "Compute in Q1.15 (16 bit)" }),
    CmdInfo::Cmd(Command { n : "q31", op : Op::System(cmd_q31), d : "Compute in Q1.31 (32 bit)" }),

    CmdInfo::Section("Arithmetic"),
    CmdInfo::Cmd(Command { n : "mul", op : Op::Binary(operators::mul::<Dsp16>, operators::mul::<Dsp32>), d : "a * b" }),
    CmdInfo::Cmd(Command { n : "div", op : Op::Binary(operators::div::<Dsp16>, operators::div::<Dsp32>), d : "a / b" }),
    CmdInfo::Cmd(Command { n : "abs", op : Op::Unary(operators::abs::<Dsp16>, operators::abs::<Dsp32>), d : "|x|" }),
    CmdInfo::Cmd(Command { n : "sqrt", op : Op::Unary(operators::sqrt::<Dsp16>, operators::sqrt::<Dsp32>), d : "Square root" }),
    CmdInfo::Cmd(Command { n : "pow", op : Op::Binary(operators::pow::<Dsp16>, operators::pow::<Dsp32>), d : "x ^ y" }),

    CmdInfo::Section("Trigonometry (angles in units of pi)"),
    CmdInfo::Cmd(Command { n : "sin", op : Op::Unary(operators::sin::<Dsp16>, operators::sin::<Dsp32>), d : "sin(x * pi)" }),
    CmdInfo::Cmd(Command { n : "cos", op : Op::Unary(operators::cos::<Dsp16>, operators::cos::<Dsp32>), d : "cos(x * pi)" }),
    CmdInfo::Cmd(Command { n : "asin", op : Op::Unary(operators::asin::<Dsp16>, operators::asin::<Dsp32>), d : "asin(x) / pi" }),
    CmdInfo::Cmd(Command { n : "acos", op : Op::Unary(operators::acos::<Dsp16>, operators::acos::<Dsp32>), d : "acos(x) / pi" }),

    CmdInfo::Section("Logarithms"),
    CmdInfo::Cmd(Command { n : "ln", op : Op::Unary(operators::ln::<Dsp16>, operators::ln::<Dsp32>), d : "Natural logarithm" }),
    CmdInfo::Cmd(Command { n : "log2", op : Op::Unary(operators::log2::<Dsp16>, operators::log2::<Dsp32>), d : "Base-2 logarithm" }),
    CmdInfo::Cmd(Command { n : "log10", op : Op::Unary(operators::log10::<Dsp16>, operators::log10::<Dsp32>), d : "Base-10 logarithm" }),
    CmdInfo::Cmd(Command { n : "exp", op : Op::Unary(operators::exp::<Dsp16>, operators::exp::<Dsp32>), d : "e ^ x" }),
];

// ----------------------------------------
// Commands list

fn cmd_help(_shell : &mut Shell) {
    println!("Fixed-point calculator");
    println!("- operands are decimals in [-1, 1), e.g. 'mul 0.5 -0.25'");
    println!("- 'list' lists all available commands");
    println!("- 'quit' quits (as do Ctrl-C and Ctrl-D)");
}

fn cmd_quit(shell : &mut Shell) {
    shell.done = true;
}

fn cmd_q15(shell : &mut Shell) {
    shell.format = Format::Q15;
}

fn cmd_q31(shell : &mut Shell) {
    shell.format = Format::Q31;
}

fn cmd_list(_shell : &mut Shell) {
    let mut maxlen = 0;

    for c in COMMANDS.iter() {
	if let CmdInfo::Cmd(cmd) = c {
	    maxlen = usize::max(maxlen, cmd.len());
	}
    }

    let pad = maxlen + 4;

    for c in COMMANDS.iter() {
	match c {
	    CmdInfo::Cmd(cmd)   => println!("  {:2$}{}", cmd.n, cmd.d, pad),
	    CmdInfo::Section(s) => println!("---- {s}"),
	}
    }
}

// ================================================================================
// Shell implementation

fn show<T : Q>(v : T) -> String {
    return format!("{:.10} (raw {})", v.to_f64(), v.to_i64());
}

struct Shell {
    format : Format,
    done : bool,
}

impl Shell {
    fn evaluate(&mut self, cmd : &Command, args : &[f64]) -> Option<String> {
	return match (&cmd.op, self.format) {
	    (Op::System(f), _) => {
		f(self);
		None
	    },
	    (Op::Unary(f, _), Format::Q15)     => Some(show(f(Dsp16::from_f64(args[0])))),
	    (Op::Unary(_, f), Format::Q31)     => Some(show(f(Dsp32::from_f64(args[0])))),
	    (Op::Binary(f, _), Format::Q15)    => Some(show(f(Dsp16::from_f64(args[0]), Dsp16::from_f64(args[1])))),
	    (Op::Binary(_, f), Format::Q31)    => Some(show(f(Dsp32::from_f64(args[0]), Dsp32::from_f64(args[1])))),
	};
    }

    pub fn run(&mut self, line : &str) {
	let mut tokens = line.split_whitespace();
	let first_token = match tokens.next() {
	    Some(t) => t,
	    None    => return,
	};
	let args : std::result::Result<Vec<f64>, _> = tokens.map(str::parse::<f64>).collect();
	let args = match args {
	    Ok(a)  => a,
	    Err(e) => {
		println!("Bad operand: {e}");
		return;
	    },
	};
	for c in COMMANDS.iter() {
	    if let CmdInfo::Cmd(cmd) = c {
		if cmd.matches(first_token) {
		    if args.len() != cmd.arity() {
			println!("'{}' takes {} operand(s)", cmd.n, cmd.arity());
		    } else if let Some(result) = self.evaluate(cmd, &args) {
			println!("{result}");
		    }
		    return;
		}
	    }
	}
	println!("Unknown command '{first_token}'; try 'list'");
    }
}

pub fn shell() -> Result<()> {
    let mut shell = Shell { format : Format::Q15, done : false };

    // `()` can be used when no completer is required
    let mut rl = Editor::<()>::new();
    rl.load_history(HISTORY_FILE).unwrap_or(());
    while !shell.done {
	let prompt = match shell.format {
	    Format::Q15 => "q15> ",
	    Format::Q31 => "q31> ",
	};
	match rl.readline(prompt) {
	    Ok(line) => {
		rl.add_history_entry(line.as_str());
		shell.run(&line);
	    },
	    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
	    Err(e) => {
		error!("Readline failed: {e}");
		break;
	    },
	}
    }
    if let Err(e) = rl.save_history(HISTORY_FILE) {
	warn!("Could not save history to {HISTORY_FILE}: {e}");
    }
    return Ok(());
}

#[cfg(test)]
#[test]
fn test_evaluate() {
    let mut shell = Shell { format : Format::Q15, done : false };
    let mul = COMMANDS.iter().find_map(|c| match c {
	CmdInfo::Cmd(cmd) if cmd.n == "mul" => Some(cmd),
	_ => None,
    }).unwrap();
    assert_eq!(Some(show(qdsp::dsp::qformat::q16(0.125))), shell.evaluate(mul, &[0.5, 0.25]));
    shell.run("q31");
    assert_eq!(Format::Q31, shell.format);
    assert_eq!(Some(show(qdsp::dsp::qformat::q32(0.125))), shell.evaluate(mul, &[0.5, 0.25]));
    shell.run("quit");
    assert!(shell.done);
}
