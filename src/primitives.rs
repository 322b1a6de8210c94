//! Built-in primitive functions and their registry.
//!
//! Every primitive shares one erased signature: the interpreter plus the
//! call's arguments, with the callee name already stripped. Missing
//! arguments default to the empty string, malformed integers to zero, and
//! soft failures to the empty result; the only signal a primitive can
//! raise is [`Signal::Halt`].
//!
//! The registry is a single contiguous table for ease of auditing, with a
//! lazily built name index over it. User-level shadowing is not handled
//! here: the engine consults the form store and any caller-registered
//! primitives before this table.
//!
//! ## Adding a primitive
//!
//! 1. Implement a `fn(&mut Interpreter, &[String]) -> Result<String, Signal>`
//! 2. Add it to `PRIMITIVES` under its two-letter name
//! 3. Add tests in the group's test section below

use std::collections::HashMap;
use std::sync::LazyLock;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::engine::{Interpreter, Signal};
use crate::form::Form;
use crate::number;

/// Canonical primitive signature.
pub type PrimitiveFn = fn(&mut Interpreter, &[String]) -> Result<String, Signal>;

/// Fixed reply of the recognized-but-unimplemented stream and
/// block-storage primitives.
const NOT_AVAILABLE: &str = "N/A";

/// The built-in primitives, grouped as in the T-64 manual.
static PRIMITIVES: &[(&str, PrimitiveFn)] = &[
    // Form definition and listing
    ("ds", prim_ds),
    ("ss", prim_ss),
    ("cl", prim_cl),
    ("ln", prim_ln),
    ("dd", prim_dd),
    ("da", prim_da),
    // Character navigation
    ("cc", prim_cc),
    ("cs", prim_cs),
    ("cn", prim_cn),
    ("in", prim_in),
    ("cr", prim_cr),
    ("pf", prim_pf),
    // Arithmetic and comparison
    ("ad", prim_ad),
    ("su", prim_su),
    ("ml", prim_ml),
    ("dv", prim_dv),
    ("eq", prim_eq),
    ("gr", prim_gr),
    // Boolean bit-strings
    ("bu", prim_bu),
    ("bi", prim_bi),
    ("bc", prim_bc),
    ("bs", prim_bs),
    ("br", prim_br),
    // Segmentation gap
    ("sr", prim_sr),
    // Codec
    ("sl", prim_sl),
    ("cd", prim_cd),
    ("dc", prim_dc),
    // Meta-character and I/O bridge
    ("qm", prim_qm),
    ("cm", prim_cm),
    ("ps", prim_ps),
    ("rc", prim_rc),
    ("rs", prim_rs),
    ("hl", prim_hl),
    ("tn", prim_tn),
    ("tf", prim_tf),
    // Recognized stubs
    ("sb", prim_stub),
    ("fb", prim_stub),
    ("eb", prim_stub),
    ("ai", prim_stub),
    ("ao", prim_stub),
    ("sp", prim_stub),
    ("rp", prim_stub),
];

static BY_NAME: LazyLock<HashMap<&'static str, PrimitiveFn>> =
    LazyLock::new(|| PRIMITIVES.iter().copied().collect());

/// Look up a built-in primitive by callee name.
pub fn lookup(name: &str) -> Option<PrimitiveFn> {
    BY_NAME.get(name).copied()
}

/// Argument `i`, defaulting to the empty string.
fn arg(args: &[String], i: usize) -> &str {
    args.get(i).map(String::as_str).unwrap_or("")
}

/// Arguments from position `i` on.
fn rest(args: &[String], i: usize) -> &[String] {
    args.get(i..).unwrap_or(&[])
}

fn null() -> Result<String, Signal> {
    Ok(String::new())
}

//
// Form definition and listing
//

fn prim_ds(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    interp.forms_mut().define(arg(args, 0), arg(args, 1));
    null()
}

fn prim_ss(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    if let Some(form) = interp.forms_mut().get_mut(arg(args, 0)) {
        form.segment(rest(args, 1));
    }
    null()
}

fn prim_cl(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    Ok(interp
        .forms()
        .get(arg(args, 0))
        .map(|form| form.fill(rest(args, 1)))
        .unwrap_or_default())
}

fn prim_ln(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    Ok(interp.forms().names().collect::<Vec<_>>().join(arg(args, 0)))
}

fn prim_dd(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    for name in args {
        interp.forms_mut().delete(name);
    }
    null()
}

fn prim_da(interp: &mut Interpreter, _args: &[String]) -> Result<String, Signal> {
    interp.forms_mut().clear();
    null()
}

//
// Character navigation
//
// A pointer that would escape the form delivers the fallback argument
// through the active buffer regardless of the call's mode; an absent
// form yields plain empty.
//

fn prim_cc(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let Some(form) = interp.forms_mut().get_mut(arg(args, 0)) else {
        return null();
    };
    match form.take_char() {
        Some(c) => Ok(c.to_string()),
        None => {
            interp.set_force_active();
            Ok(arg(args, 1).to_owned())
        }
    }
}

fn prim_cs(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let Some(form) = interp.forms_mut().get_mut(arg(args, 0)) else {
        return null();
    };
    match form.take_segment() {
        Some(text) => Ok(text),
        None => {
            interp.set_force_active();
            Ok(arg(args, 1).to_owned())
        }
    }
}

fn prim_cn(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let count = number::parse_int(arg(args, 1));
    let Some(form) = interp.forms_mut().get_mut(arg(args, 0)) else {
        return null();
    };
    // A count beyond isize certainly escapes the form.
    let taken = count.to_isize().and_then(|delta| form.take_span(delta));
    match taken {
        Some(text) => Ok(text),
        None => {
            interp.set_force_active();
            Ok(arg(args, 2).to_owned())
        }
    }
}

fn prim_in(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let Some(form) = interp.forms_mut().get_mut(arg(args, 0)) else {
        return null();
    };
    match form.find_string(arg(args, 1)) {
        Some(text) => Ok(text),
        None => {
            interp.set_force_active();
            Ok(arg(args, 2).to_owned())
        }
    }
}

/// `cr` is two operations sharing a name: with two or more arguments it
/// is the radix codec (`R1 R2 V`), otherwise the form pointer restore.
fn prim_cr(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    if args.len() >= 2 {
        return Ok(radix_convert(arg(args, 0), arg(args, 1), arg(args, 2)));
    }
    if let Some(form) = interp.forms_mut().get_mut(arg(args, 0)) {
        form.reset_pointer();
    }
    null()
}

fn prim_pf(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let rendering = interp.forms().get(arg(args, 0)).map(Form::pretty);
    if let Some(rendering) = rendering {
        interp.write(&rendering);
    }
    null()
}

//
// Arithmetic and comparison
//

// Macro for the two-operand big-integer primitives.
macro_rules! arith_primitive {
    ($name:ident, $op:tt) => {
        fn $name(_interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
            let a = number::parse_int(arg(args, 0));
            let b = number::parse_int(arg(args, 1));
            Ok((a $op b).to_string())
        }
    };
}

arith_primitive!(prim_ad, +);
arith_primitive!(prim_su, -);
arith_primitive!(prim_ml, *);

/// Integer quotient, truncating toward zero; division by zero is "0".
fn prim_dv(_interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let a = number::parse_int(arg(args, 0));
    let b = number::parse_int(arg(args, 1));
    if b.is_zero() {
        return Ok("0".to_owned());
    }
    Ok((a / b).to_string())
}

/// String equality, selecting the T or F argument.
fn prim_eq(_interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let chosen = if arg(args, 0) == arg(args, 1) {
        arg(args, 2)
    } else {
        arg(args, 3)
    };
    Ok(chosen.to_owned())
}

/// Numeric greater-than on big integers, selecting the T or F argument.
fn prim_gr(_interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let a = number::parse_int(arg(args, 0));
    let b = number::parse_int(arg(args, 1));
    let chosen = if a > b { arg(args, 2) } else { arg(args, 3) };
    Ok(chosen.to_owned())
}

//
// Boolean bit-strings
//
// Operands are the Boolean suffixes of the arguments: the maximal
// trailing runs of 0/1 characters.
//

fn pad_left(s: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    for _ in s.len()..width {
        out.push('0');
    }
    out.push_str(s);
    out
}

/// Bitwise OR; the shorter operand is left-padded with zeros.
fn prim_bu(_interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let a = number::bool_suffix(arg(args, 0));
    let b = number::bool_suffix(arg(args, 1));
    let width = a.len().max(b.len());
    let (a, b) = (pad_left(a, width), pad_left(b, width));
    Ok(a.bytes()
        .zip(b.bytes())
        .map(|(x, y)| if x == b'1' || y == b'1' { '1' } else { '0' })
        .collect())
}

/// Bitwise AND; the longer operand is truncated on the left.
fn prim_bi(_interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let a = number::bool_suffix(arg(args, 0));
    let b = number::bool_suffix(arg(args, 1));
    let width = a.len().min(b.len());
    let a = &a[a.len() - width..];
    let b = &b[b.len() - width..];
    Ok(a.bytes()
        .zip(b.bytes())
        .map(|(x, y)| if x == b'1' && y == b'1' { '1' } else { '0' })
        .collect())
}

/// Bitwise NOT, length preserved.
fn prim_bc(_interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    Ok(number::bool_suffix(arg(args, 0))
        .bytes()
        .map(|x| if x == b'1' { '0' } else { '1' })
        .collect())
}

/// Shift by a signed count: positive left, negative right, zero fill,
/// length preserved. Counts at or past the length give all zeros.
fn prim_bs(_interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let value = number::bool_suffix(arg(args, 1));
    let len = value.len();
    if len == 0 {
        return null();
    }
    let count = number::parse_int(arg(args, 0));
    let Some(n) = count.abs().to_usize().filter(|&n| n < len) else {
        return Ok("0".repeat(len));
    };
    Ok(if count.is_negative() {
        format!("{}{}", "0".repeat(n), &value[..len - n])
    } else {
        format!("{}{}", &value[n..], "0".repeat(n))
    })
}

/// Circular rotate by a signed count, reduced modulo the length:
/// positive left, negative right.
fn prim_br(_interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let value = number::bool_suffix(arg(args, 1));
    let len = value.len();
    if len == 0 {
        return null();
    }
    let count = number::parse_int(arg(args, 0));
    let modulus = BigInt::from(len);
    let n = ((count % &modulus + &modulus) % &modulus)
        .to_usize()
        .unwrap_or(0);
    Ok(format!("{}{}", &value[n..], &value[..n]))
}

//
// Segmentation gap
//

/// The highest marker number of the form when the numbering has a gap,
/// else "0". Absent or marker-free forms are also "0".
fn prim_sr(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let gap = interp.forms().get(arg(args, 0)).and_then(Form::marker_gap);
    Ok(match gap {
        Some(max) => max.to_string(),
        None => "0".to_owned(),
    })
}

//
// Codec
//

fn radix_convert(from: &str, to: &str, numeral: &str) -> String {
    fn base_of(s: &str) -> Option<u32> {
        number::radix_base(s.chars().next()?)
    }
    let converted = (|| {
        let from = base_of(from)?;
        let to = base_of(to)?;
        let value = number::parse_in_base(numeral, from)?;
        number::format_in_base(&value, to)
    })();
    converted.unwrap_or_default()
}

/// Character count of the argument, in decimal.
fn prim_sl(_interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    Ok(arg(args, 0).chars().count().to_string())
}

/// Code point of the first character, "0" for the empty string.
fn prim_cd(_interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    Ok(arg(args, 0)
        .chars()
        .next()
        .map_or_else(|| "0".to_owned(), |c| (c as u32).to_string()))
}

/// The character with the given code point, empty when out of range.
fn prim_dc(_interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    let n = number::parse_int(arg(args, 0));
    Ok(n.to_u32()
        .and_then(char::from_u32)
        .map(String::from)
        .unwrap_or_default())
}

//
// Meta-character and I/O bridge
//

fn prim_qm(interp: &mut Interpreter, _args: &[String]) -> Result<String, Signal> {
    Ok(interp.meta().to_string())
}

fn prim_cm(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    if let Some(c) = arg(args, 0).chars().next() {
        interp.set_meta(c);
    }
    null()
}

fn prim_ps(interp: &mut Interpreter, args: &[String]) -> Result<String, Signal> {
    interp.write(arg(args, 0));
    null()
}

/// One character from the source; a drained source halts the run.
fn prim_rc(interp: &mut Interpreter, _args: &[String]) -> Result<String, Signal> {
    match interp.read_char() {
        Some(c) => Ok(c.to_string()),
        None => Err(Signal::Halt),
    }
}

/// Characters up to (not including) the meta-character. A drained source
/// yields whatever accumulated; it halts only when nothing was read.
fn prim_rs(interp: &mut Interpreter, _args: &[String]) -> Result<String, Signal> {
    let mut text = String::new();
    loop {
        match interp.read_char() {
            Some(c) if c == interp.meta() => return Ok(text),
            Some(c) => text.push(c),
            None if text.is_empty() => return Err(Signal::Halt),
            None => return Ok(text),
        }
    }
}

fn prim_hl(_interp: &mut Interpreter, _args: &[String]) -> Result<String, Signal> {
    Err(Signal::Halt)
}

fn prim_tn(interp: &mut Interpreter, _args: &[String]) -> Result<String, Signal> {
    interp.set_trace(true);
    null()
}

fn prim_tf(interp: &mut Interpreter, _args: &[String]) -> Result<String, Signal> {
    interp.set_trace(false);
    null()
}

fn prim_stub(_interp: &mut Interpreter, _args: &[String]) -> Result<String, Signal> {
    Ok(NOT_AVAILABLE.to_owned())
}
