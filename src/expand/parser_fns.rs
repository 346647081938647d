//! Parser function implementations.
//!
//! <https://www.mediawiki.org/wiki/Help:Extension:ParserFunctions>

// Clippy: Functions signatures all conform to a specific API; inline modules
// are clearer with wildcard import.
#![allow(clippy::unnecessary_wraps, clippy::wildcard_imports)]

use super::{Result, Scope, expr};
use crate::{
    common::{DateError, UrlEncoding, anchor_encode, decode_html, format_date, url_decode},
    title::Namespace,
    wikitext::{TemplateArgument, Visitor as _},
};
use core::fmt::{self, Write as _};
use either::Either;
use regex::Regex;
use std::sync::LazyLock;
use time::{OffsetDateTime, UtcOffset};

/// The function signature of a parser function.
type ParserFn = fn(&mut String, &IndexedArgs<'_>) -> Result;

/// The longest string the padding functions will produce.
const MAX_PAD_LEN: usize = 500;

/// The arguments of a parser function call.
///
/// Arguments are expanded only when a function asks for them, so the branch
/// not taken by a conditional is never expanded.
pub(super) struct IndexedArgs<'a> {
    /// The scope the call appears in.
    pub scope: Scope<'a>,
    /// The lowercased name of the callee.
    pub callee: &'a str,
    /// The arguments. The first argument of a call with a dynamic name is
    /// already expanded.
    pub arguments: Vec<Either<String, &'a TemplateArgument>>,
}

impl IndexedArgs<'_> {
    /// Expands an entire argument at the given index as a single value,
    /// including any `name=` part.
    ///
    /// The returned value will include any leading and trailing whitespace
    /// present in the original text.
    pub fn eval(&self, index: usize) -> Result<Option<String>> {
        match self.arguments.get(index) {
            None => Ok(None),
            Some(Either::Left(value)) => Ok(Some(value.clone())),
            Some(Either::Right(argument)) => self
                .scope
                .render(|frame| frame.visit_template_argument(argument))
                .map(Some),
        }
    }

    /// Expands and trims the name of the argument at the given index, or
    /// returns `None` if the argument is positional.
    pub fn name(&self, index: usize) -> Result<Option<String>> {
        match self.arguments.get(index) {
            Some(Either::Right(TemplateArgument {
                name: Some(name), ..
            })) => self
                .scope
                .render(|frame| frame.visit_document(name))
                .map(|name| Some(trim(name))),
            _ => Ok(None),
        }
    }

    /// Expands the value of the argument at the given index, without any
    /// `name=` part.
    pub fn value(&self, index: usize) -> Result<Option<String>> {
        match self.arguments.get(index) {
            None => Ok(None),
            Some(Either::Left(value)) => Ok(Some(value.clone())),
            Some(Either::Right(argument)) => self
                .scope
                .render(|frame| frame.visit_document(&argument.value))
                .map(Some),
        }
    }

    /// Expands the value of the last argument with the given name.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        for index in (0..self.len()).rev() {
            if self.name(index)?.as_deref() == Some(key) {
                return self.value(index);
            }
        }
        Ok(None)
    }

    /// Returns the number of arguments.
    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    /// The current time for `current*` variables, or in the local time zone
    /// for `local*` variables.
    fn now(&self) -> OffsetDateTime {
        let session = self.scope.session;
        if self.callee.starts_with("local") {
            session.now.to_offset(session.local_offset)
        } else {
            session.now
        }
    }
}

mod cond {
    //! Flow control parser functions.

    use super::*;

    /// `{{#expr: expression}}`
    pub fn expr(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        if let Some(expr) = arguments.eval(0)?.map(trim) {
            match expr::evaluate(&expr) {
                Ok(Some(result)) => *out += &expr::format_result(result),
                Ok(None) => {}
                Err(err) => error_marker(out, format_args!("Expression error: {err}"))?,
            }
        }

        Ok(())
    }

    /// `{{#if: condition | consequent (!condition.trim().is_empty()) | alternate }}`
    pub fn r#if(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let lhs_is_empty = arguments.eval(0)?.map(trim).is_none_or(|lhs| lhs.is_empty());
        let index = 1 + usize::from(lhs_is_empty);
        log::trace!("#if: taking branch {index}");
        if let Some(value) = arguments.eval(index)?.map(trim) {
            *out += &value;
        }

        Ok(())
    }

    /// `{{#ifeq: lhs | rhs | consequent (lhs == rhs) | alternate }}`
    pub fn if_eq(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let lhs = arguments.eval(0)?.map(decode_trim).unwrap_or_default();
        let rhs = arguments.eval(1)?.map(decode_trim).unwrap_or_default();
        let is_eq = fuzzy_cmp(&lhs, &rhs);
        if let Some(value) = arguments.eval(2 + usize::from(!is_eq))?.map(trim) {
            *out += &value;
        }

        Ok(())
    }

    /// `{{#iferror: condition | consequent (error) | alternate (no error) }}`
    pub fn if_error(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        static I_AM_BAD: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r#"<(?:strong|span|p|div)\s(?:[^\s>]*\s+)*?class="(?:[^"\s>]*\s+)*?error(?:\s[^">]*)?""#).unwrap()
        });

        let lhs = arguments.eval(0)?.map(trim);
        let is_error = lhs.as_deref().is_some_and(|lhs| I_AM_BAD.is_match(lhs));

        if is_error {
            if let Some(value) = arguments.eval(1)?.map(trim) {
                *out += &value;
            }
        } else if let Some(value) = arguments.eval(2)?.map(trim) {
            *out += &value;
        } else if let Some(value) = lhs {
            *out += &value;
        }

        Ok(())
    }

    /// `{{#ifexpr: expression | consequent (expression != 0.0) | alternate }}`
    pub fn if_expr(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let expr = arguments.eval(0)?.map(trim).unwrap_or_default();
        match expr::evaluate(&expr) {
            Ok(result) => {
                let index = 1 + usize::from(result.unwrap_or(0.0) == 0.0);
                if let Some(value) = arguments.eval(index)?.map(trim) {
                    *out += &value;
                }
            }
            Err(err) => error_marker(out, format_args!("Expression error: {err}"))?,
        }

        Ok(())
    }

    /// `{{#ifexist: title | consequent (exists) | alternate }}`
    ///
    /// There is no page database to consult, so no page exists.
    pub fn if_exist(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        if let Some(value) = arguments.eval(2)?.map(trim) {
            *out += &value;
        }

        Ok(())
    }

    /// `{{#switch: match | case [| case ...] = value | default }}`
    pub fn switch(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let lhs = arguments.eval(0)?.map(decode_trim).unwrap_or_default();
        let mut found = false;
        let mut consequent = None;

        let len = arguments.len();
        for index in 1..len {
            // If the case is in the form `k=v` then it is a new case,
            // otherwise we must record whether the case matched and
            // continue processing until a `k=v` is encountered to know
            // the consequent
            let (rhs, is_kv) = if let Some(name) = arguments.name(index)? {
                (name, true)
            } else {
                (arguments.eval(index)?.unwrap_or_default(), false)
            };
            let rhs = decode_trim(rhs);

            // Default value can either be a bare final parameter or it
            // can be `#default = value`
            if rhs == "#default" && is_kv {
                consequent = Some(index);
            }

            if !found {
                found = fuzzy_cmp(&lhs, &rhs);
            }

            if found && is_kv {
                consequent = Some(index);
                break;
            }

            // A bare final case is the default value, even after a
            // `#default = value`
            if index + 1 == len && !is_kv {
                consequent = Some(index);
                break;
            }
        }

        if let Some(consequent) = consequent
            && let Some(value) = arguments.value(consequent)?.map(trim)
        {
            *out += &value;
        }

        Ok(())
    }
}

mod ext {
    //! Tag and extension parser functions.

    use super::*;

    /// `{{#tag: tag_name | content [| attribute [= value] ...] }}`
    pub fn tag(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let Some(name) = arguments.eval(0)?.map(trim) else {
            return Ok(());
        };
        let name = name.to_ascii_lowercase();
        if name.is_empty() {
            return Ok(());
        }

        write!(out, "<{name}")?;
        for index in 2..arguments.len() {
            if let Some(key) = arguments.name(index)? {
                let value = arguments.value(index)?.map(trim).unwrap_or_default();
                let value = unquote(&value);
                write!(
                    out,
                    " {key}=\"{}\"",
                    html_escape::encode_double_quoted_attribute(value)
                )?;
            } else if let Some(key) = arguments.eval(index)?.map(trim)
                && !key.is_empty()
            {
                write!(out, " {key}=\"\"")?;
            }
        }

        if let Some(content) = arguments.eval(1)? {
            write!(out, ">{content}</{name}>")?;
        } else {
            out.push_str("/>");
        }

        Ok(())
    }

    /// `{{#invoke: module | function [| argument [= value] ...] }}`
    ///
    /// Modules cannot be executed, so this expands to nothing.
    pub fn invoke(_: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        log::warn!(
            "stub: #invoke({:?}, {:?})",
            arguments.eval(0)?.map(trim),
            arguments.eval(1)?.map(trim)
        );
        Ok(())
    }

    /// `{{#property: name [| from = Qid] }}`
    ///
    /// There is no Wikibase repository, so this expands to nothing.
    pub fn property(_: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        if let Some(name) = arguments.eval(0)?.map(trim) {
            let id = arguments.get("from")?;
            log::warn!("stub: #property({name}, {id:?})");
        }
        Ok(())
    }

    /// Removes one pair of matching quotes around an attribute value.
    fn unquote(value: &str) -> &str {
        for quote in ['"', '\''] {
            if let Some(inner) = value
                .strip_prefix(quote)
                .and_then(|value| value.strip_suffix(quote))
            {
                return inner;
            }
        }
        value
    }
}

mod misc {
    //! Escapes and expressions.

    use super::*;

    /// `{{!}}`
    pub fn pipe(out: &mut String, _: &IndexedArgs<'_>) -> Result {
        out.push('|');
        Ok(())
    }

    /// `{{=}}`
    pub fn equals(out: &mut String, _: &IndexedArgs<'_>) -> Result {
        out.push('=');
        Ok(())
    }
}

mod string {
    //! String manipulation functions.

    use super::*;

    /// `{{anchorencode: text }}`
    pub fn anchor_encode(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        if let Some(text) = arguments.eval(0)?.map(trim) {
            *out += &super::anchor_encode(&text);
        }

        Ok(())
    }

    /// `{{#explode: string | delimiter | position [| limit] }}`
    pub fn explode(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let Some(value) = arguments.eval(0)?.map(trim) else {
            return Ok(());
        };
        let delimiter = arguments
            .eval(1)?
            .map(trim)
            .filter(|delimiter| !delimiter.is_empty())
            .unwrap_or_else(|| " ".to_string());
        let position = int_arg(arguments, 2)?.unwrap_or(0);
        let limit = int_arg(arguments, 3)?
            .and_then(|limit| usize::try_from(limit).ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(usize::MAX);

        let parts = value.splitn(limit, delimiter.as_str()).collect::<Vec<_>>();
        let index = if position < 0 {
            usize::try_from(position.unsigned_abs())
                .ok()
                .and_then(|back| parts.len().checked_sub(back))
        } else {
            usize::try_from(position).ok()
        };
        if let Some(part) = index.and_then(|index| parts.get(index)) {
            out.push_str(part);
        }

        Ok(())
    }

    /// `{{formatnum: number [|R] }}`
    pub fn format_number(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        if let Some(n) = arguments.eval(0)?.map(trim)
            && !n.is_empty()
        {
            let reverse = if let Some(flag) = arguments.eval(1)?.map(trim) {
                if !flag.is_empty() && flag != "R" {
                    log::warn!("formatnum: unsupported flag {flag}");
                }
                flag == "R"
            } else {
                false
            };
            *out += &crate::common::format_number(&n, reverse);
        }

        Ok(())
    }

    /// `{{lc: string }}`
    pub fn lc(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        if let Some(value) = arguments.eval(0)?.map(trim) {
            *out += &value.to_lowercase();
        }
        Ok(())
    }

    /// `{{lcfirst: string }}`
    pub fn lc_first(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        if let Some(value) = arguments.eval(0)?.map(trim) {
            let mut text = value.chars();
            if let Some(first) = text.next() {
                write!(out, "{}{}", first.to_lowercase(), text.as_str())?;
            }
        }
        Ok(())
    }

    /// `{{#len: string }}`
    pub fn len(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let len = arguments
            .eval(0)?
            .map(trim)
            .map_or(0, |value| value.chars().count());
        write!(out, "{len}")?;
        Ok(())
    }

    /// `{{#pad: string | length [| padding [| left | right | center]] }}`
    pub fn pad(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let direction = arguments.eval(3)?.map(trim).unwrap_or_default();
        let direction = match direction.as_str() {
            "right" => Pad::Right,
            "center" => Pad::Center,
            _ => Pad::Left,
        };
        pad_with(out, arguments, " ", direction)
    }

    /// `{{padleft: string | length [| padding] }}`
    pub fn pad_left(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        pad_with(out, arguments, "0", Pad::Left)
    }

    /// `{{padright: string | length [| padding] }}`
    pub fn pad_right(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        pad_with(out, arguments, "0", Pad::Right)
    }

    /// The side of a string to which padding is added.
    #[derive(Clone, Copy)]
    enum Pad {
        Left,
        Right,
        Center,
    }

    /// Pads the first argument to the length given in the second argument
    /// with the padding given in the third argument.
    fn pad_with(
        out: &mut String,
        arguments: &IndexedArgs<'_>,
        default_padding: &str,
        direction: Pad,
    ) -> Result {
        let Some(value) = arguments.eval(0)?.map(trim) else {
            return Ok(());
        };
        let len = int_arg(arguments, 1)?
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0)
            .min(MAX_PAD_LEN);
        let padding = arguments
            .eval(2)?
            .map(trim)
            .unwrap_or_else(|| default_padding.to_string());

        let missing = len.saturating_sub(value.chars().count());
        if missing == 0 || padding.is_empty() {
            *out += &value;
            return Ok(());
        }

        let fill = |count| padding.chars().cycle().take(count).collect::<String>();
        match direction {
            Pad::Left => write!(out, "{}{value}", fill(missing))?,
            Pad::Right => write!(out, "{value}{}", fill(missing))?,
            Pad::Center => {
                let left = missing / 2;
                write!(out, "{}{value}{}", fill(left), fill(missing - left))?;
            }
        }
        Ok(())
    }

    /// `{{plural: number | singular | plural }}`
    pub fn plural(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        if let Some(value) = arguments.eval(0)?.map(trim) {
            let n = value
                .replace(',', "")
                .parse::<f64>()
                .map_or(0.0, f64::abs);
            let forms = arguments.len().saturating_sub(1);
            if forms != 0 {
                let index = usize::from(n != 1.0).min(forms - 1);
                if let Some(value) = arguments.eval(1 + index)?.map(trim) {
                    *out += &value;
                }
            }
        }

        Ok(())
    }

    /// `{{#pos: string | search [| offset] }}`
    pub fn pos(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let value = arguments.eval(0)?.map(trim).unwrap_or_default();
        let search = search_arg(arguments, 1)?;
        let offset = char_offset(&value, int_arg(arguments, 2)?.unwrap_or(0));
        if let Some(found) = value[offset..].find(&search) {
            write!(out, "{}", value[..offset + found].chars().count())?;
        }
        Ok(())
    }

    /// `{{#replace: string | search [| replacement] }}`
    pub fn replace(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let value = arguments.eval(0)?.map(trim).unwrap_or_default();
        let search = search_arg(arguments, 1)?;
        let replacement = arguments.eval(2)?.map(trim).unwrap_or_default();
        *out += &value.replace(&search, &replacement);
        Ok(())
    }

    /// `{{#rpos: string | search [| offset] }}`
    pub fn rpos(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let value = arguments.eval(0)?.map(trim).unwrap_or_default();
        let search = search_arg(arguments, 1)?;
        let offset = char_offset(&value, int_arg(arguments, 2)?.unwrap_or(0).max(0));
        if let Some(found) = value[offset..].rfind(&search) {
            write!(out, "{}", value[..offset + found].chars().count())?;
        } else {
            out.push_str("-1");
        }
        Ok(())
    }

    /// `{{#sub: string | start [| length] }}`
    pub fn sub(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let value = arguments.eval(0)?.map(trim).unwrap_or_default();
        let start = char_offset(&value, int_arg(arguments, 1)?.unwrap_or(0));
        let rest = &value[start..];
        let end = match int_arg(arguments, 2)?.unwrap_or(0) {
            0 => rest.len(),
            len if len < 0 => {
                let count = rest.chars().count();
                let keep = usize::try_from(len.unsigned_abs())
                    .map_or(0, |cut| count.saturating_sub(cut));
                char_offset(rest, i64::try_from(keep).unwrap_or(i64::MAX))
            }
            len => char_offset(rest, len),
        };
        *out += &rest[..end];
        Ok(())
    }

    /// `{{#titleparts: title [| count [| first]] }}`
    pub fn title_parts(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let title = arguments.eval(0)?.map(trim).unwrap_or_default();
        let title = decode_html(&title);
        let count = int_arg(arguments, 1)?.unwrap_or(0);
        let first = int_arg(arguments, 2)?.unwrap_or(1);

        let parts = title.split('/').collect::<Vec<_>>();
        let len = i64::try_from(parts.len()).unwrap_or(i64::MAX);
        let start = match first {
            first if first < 0 => (len + first).max(0),
            0 => 0,
            first => (first - 1).min(len),
        };
        let end = match count {
            count if count < 0 => (len + count).max(0),
            0 => len,
            count => start.saturating_add(count).min(len),
        };

        if let (Ok(start), Ok(end)) = (usize::try_from(start), usize::try_from(end))
            && start < end
        {
            *out += &parts[start..end].join("/");
        }

        Ok(())
    }

    /// `{{uc: string }}`
    pub fn uc(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        if let Some(value) = arguments.eval(0)?.map(trim) {
            *out += &value.to_uppercase();
        }
        Ok(())
    }

    /// `{{ucfirst: string }}`
    pub fn uc_first(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        if let Some(value) = arguments.eval(0)?.map(trim) {
            let mut text = value.chars();
            if let Some(first) = text.next() {
                write!(out, "{}{}", first.to_uppercase(), text.as_str())?;
            }
        }
        Ok(())
    }

    /// The search string argument for the functions which search, which is
    /// a space if it is missing or empty.
    fn search_arg(arguments: &IndexedArgs<'_>, index: usize) -> Result<String> {
        Ok(arguments
            .eval(index)?
            .map(trim)
            .filter(|search| !search.is_empty())
            .unwrap_or_else(|| " ".to_string()))
    }

    /// Converts a character offset into a byte offset. Negative offsets count
    /// from the end of the string. Offsets are clamped to the string.
    fn char_offset(value: &str, offset: i64) -> usize {
        let offset = if offset < 0 {
            let count = value.chars().count();
            usize::try_from(offset.unsigned_abs()).map_or(0, |back| count.saturating_sub(back))
        } else {
            usize::try_from(offset).unwrap_or(usize::MAX)
        };
        value
            .char_indices()
            .nth(offset)
            .map_or(value.len(), |(index, _)| index)
    }
}

mod url {
    //! URL and title functions.

    use super::*;

    /// `{{ns: namespace name or id }}`
    pub fn namespace_by_name_or_id(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let ns = arguments.eval(0)?.map(trim).and_then(|value| {
            if let Ok(id) = value.parse::<i32>() {
                Namespace::find_by_id(id)
            } else {
                Namespace::find_by_name(&value)
            }
        });
        if let Some(ns) = ns {
            *out += ns.name;
        }

        Ok(())
    }

    /// `{{urlencode: string [| QUERY | WIKI | PATH] }}`
    pub fn url_encode(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        if let Some(value) = arguments.eval(0)?.map(trim) {
            let encoding = arguments
                .eval(1)?
                .map_or(UrlEncoding::default(), |mode| UrlEncoding::from_name(&mode));
            *out += &encoding.encode(&value);
        }
        Ok(())
    }

    /// `{{#urldecode: string }}`
    pub fn url_decode(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        if let Some(value) = arguments.eval(0)?.map(trim) {
            *out += &super::url_decode(&value);
        }
        Ok(())
    }
}

mod date {
    //! Date and time functions.

    use super::*;

    /// `{{LOCALTIME}}` or `{{CURRENTTIME}}`
    pub fn clock_time(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let time = arguments.now();
        write!(out, "{:02}:{:02}", time.hour(), time.minute())?;
        Ok(())
    }

    /// `{{LOCALDAY}}` or `{{CURRENTDAY}}`
    pub fn day(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        write!(out, "{}", arguments.now().day())?;
        Ok(())
    }

    /// `{{LOCALDAY2}}` or `{{CURRENTDAY2}}`
    pub fn day_lz(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        write!(out, "{:02}", arguments.now().day())?;
        Ok(())
    }

    /// `{{LOCALDAYNAME}}` or `{{CURRENTDAYNAME}}`
    pub fn day_name(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        write!(out, "{}", arguments.now().weekday())?;
        Ok(())
    }

    /// `{{LOCALDOW}}` or `{{CURRENTDOW}}`
    pub fn day_of_week(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        write!(out, "{}", arguments.now().weekday().number_days_from_sunday())?;
        Ok(())
    }

    /// `{{LOCALHOUR}}` or `{{CURRENTHOUR}}`
    pub fn hour(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        write!(out, "{:02}", arguments.now().hour())?;
        Ok(())
    }

    /// `{{LOCALMONTH1}}` or `{{CURRENTMONTH1}}`
    pub fn month(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        write!(out, "{}", u8::from(arguments.now().month()))?;
        Ok(())
    }

    /// `{{LOCALMONTHABBREV}}` or `{{CURRENTMONTHABBREV}}`
    pub fn month_abbr(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        out.push_str(&arguments.now().month().to_string()[..3]);
        Ok(())
    }

    /// `{{LOCALMONTH}}` or `{{LOCALMONTH2}}` or `{{CURRENTMONTH}}` or
    /// `{{CURRENTMONTH2}}`
    pub fn month_lz(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        write!(out, "{:02}", u8::from(arguments.now().month()))?;
        Ok(())
    }

    /// `{{LOCALMONTHNAME}}` or `{{CURRENTMONTHNAME}}`
    pub fn month_name(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        write!(out, "{}", arguments.now().month())?;
        Ok(())
    }

    /// `{{#time: format [| time [| language code [| local ]]] }}`
    pub fn time(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let local = arguments
            .eval(3)?
            .map(trim)
            .is_some_and(|local| matches!(local.as_str(), "1" | "true" | "local"));
        format_time(out, arguments, local)
    }

    /// `{{#timel: format [| time ]}}`
    pub fn time_local(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        format_time(out, arguments, true)
    }

    /// Formats the date in the second argument with the format in the first
    /// argument.
    fn format_time(out: &mut String, arguments: &IndexedArgs<'_>, local: bool) -> Result {
        let Some(format) = arguments.eval(0)?.map(trim) else {
            return Ok(());
        };
        let date = arguments.eval(1)?.map(trim);
        let session = arguments.scope.session;
        let offset = if local {
            session.local_offset
        } else {
            UtcOffset::UTC
        };

        match format_date(session.now, &format, date.as_deref(), offset) {
            Ok(result) => *out += &result,
            Err(err) => {
                log::debug!("#time: {err}");
                error_marker(out, time_error(&err))?;
            }
        }
        Ok(())
    }

    /// The user-facing message for a date error.
    fn time_error(err: &DateError) -> &'static str {
        match err {
            DateError::Invalid(_) => "Error: Invalid time.",
            DateError::Format(_) => "Error: Time out of range.",
        }
    }

    /// `{{LOCALTIMESTAMP}}` or `{{CURRENTTIMESTAMP}}`
    pub fn timestamp(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        let time = arguments.now();
        write!(
            out,
            "{}{:02}{:02}{:02}{:02}{:02}",
            time.year(),
            u8::from(time.month()),
            time.day(),
            time.hour(),
            time.minute(),
            time.second()
        )?;
        Ok(())
    }

    /// `{{LOCALWEEK}}` or `{{CURRENTWEEK}}`
    pub fn week(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        write!(out, "{}", arguments.now().iso_week())?;
        Ok(())
    }

    /// `{{LOCALYEAR}}` or `{{CURRENTYEAR}}`
    pub fn year(out: &mut String, arguments: &IndexedArgs<'_>) -> Result {
        write!(out, "{}", arguments.now().year())?;
        Ok(())
    }
}

/// Known parser functions.
static PARSER_FUNCTIONS: phf::Map<&'static str, ParserFn> = phf::phf_map! {
    "!" => misc::pipe,
    "=" => misc::equals,

    "#expr" => cond::expr,
    "#if" => cond::r#if,
    "#ifeq" => cond::if_eq,
    "#iferror" => cond::if_error,
    "#ifexist" => cond::if_exist,
    "#ifexpr" => cond::if_expr,
    "#switch" => cond::switch,

    "#invoke" => ext::invoke,
    "#property" => ext::property,
    "#tag" => ext::tag,

    "anchorencode" => string::anchor_encode,
    "#anchorencode" => string::anchor_encode,
    "#explode" => string::explode,
    "formatnum" => string::format_number,
    "lc" => string::lc,
    "lcfirst" => string::lc_first,
    "#len" => string::len,
    "#pad" => string::pad,
    "padleft" => string::pad_left,
    "padright" => string::pad_right,
    "plural" => string::plural,
    "#plural" => string::plural,
    "#pos" => string::pos,
    "#replace" => string::replace,
    "#rpos" => string::rpos,
    "#sub" => string::sub,
    "#titleparts" => string::title_parts,
    "uc" => string::uc,
    "ucfirst" => string::uc_first,

    "ns" => url::namespace_by_name_or_id,
    "urlencode" => url::url_encode,
    "#urlencode" => url::url_encode,
    "#urldecode" => url::url_decode,

    "currentday" => date::day,
    "currentday2" => date::day_lz,
    "currentdayname" => date::day_name,
    "currentdow" => date::day_of_week,
    "currenthour" => date::hour,
    "currentmonth" => date::month_lz,
    "currentmonth1" => date::month,
    "currentmonth2" => date::month_lz,
    "currentmonthabbrev" => date::month_abbr,
    "currentmonthname" => date::month_name,
    "currenttime" => date::clock_time,
    "currenttimestamp" => date::timestamp,
    "currentweek" => date::week,
    "currentyear" => date::year,
    "localday" => date::day,
    "localday2" => date::day_lz,
    "localdayname" => date::day_name,
    "localdow" => date::day_of_week,
    "localhour" => date::hour,
    "localmonth" => date::month_lz,
    "localmonth1" => date::month,
    "localmonth2" => date::month_lz,
    "localmonthabbrev" => date::month_abbr,
    "localmonthname" => date::month_name,
    "localtime" => date::clock_time,
    "localtimestamp" => date::timestamp,
    "localweek" => date::week,
    "localyear" => date::year,
    "#time" => date::time,
    "#timel" => date::time_local,
};

/// Calls the parser function named by `arguments.callee`. Returns `false` if
/// there is no such function.
pub(super) fn call_parser_fn(out: &mut String, arguments: &IndexedArgs<'_>) -> Result<bool> {
    if let Some(parser_fn) = PARSER_FUNCTIONS.get(arguments.callee) {
        log::trace!("calling {}", arguments.callee);
        parser_fn(out, arguments)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Writes an inline error marker.
fn error_marker(out: &mut String, message: impl fmt::Display) -> Result {
    write!(
        out,
        r#"<strong class="error">{}</strong>"#,
        html_escape::encode_text(&message.to_string())
    )?;
    Ok(())
}

/// Compares two values numerically if both are numbers, or as strings
/// otherwise.
fn fuzzy_cmp(lhs: &str, rhs: &str) -> bool {
    if let (Ok(lhs), Ok(rhs)) = (lhs.parse::<i64>(), rhs.parse::<i64>()) {
        lhs == rhs
    } else if let (Ok(lhs), Ok(rhs)) = (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        lhs == rhs
    } else {
        lhs == rhs
    }
}

/// Parses the argument at `index` as an integer. Missing, empty, and
/// malformed arguments are `None`.
fn int_arg(arguments: &IndexedArgs<'_>, index: usize) -> Result<Option<i64>> {
    Ok(arguments
        .eval(index)?
        .and_then(|value| value.trim_ascii().parse::<i64>().ok()))
}

/// Decodes HTML entities and trims ASCII whitespace from the value.
fn decode_trim(value: String) -> String {
    if value.contains('&') {
        decode_html(&value).trim_ascii().to_string()
    } else {
        trim(value)
    }
}

/// Trims ASCII whitespace from the value.
///
/// Parser function arguments are passed with their surrounding whitespace, so
/// functions which want trimmed values must trim them.
fn trim(value: String) -> String {
    let trimmed = value.trim_ascii();
    if trimmed.len() == value.len() {
        value
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ExpansionOptions, MapProvider, TemplateExpander};
    use crate::wikitext::ParserOptions;

    #[track_caller]
    fn expand(text: &str) -> String {
        let _ = env_logger::try_init();
        let expander = TemplateExpander::new(
            ParserOptions::default(),
            ExpansionOptions {
                // 2024-02-29T13:05:09Z
                now: Some(1_709_211_909),
                local_offset: Some(3600),
                ..Default::default()
            },
        );
        expander.expand(text, &MapProvider::new()).unwrap()
    }

    #[test]
    fn conditionals() {
        assert_eq!(expand("{{#if: x | yes | no}}"), "yes");
        assert_eq!(expand("{{#if:  | yes | no}}"), "no");
        assert_eq!(expand("{{#if: | yes}}"), "");
        assert_eq!(expand("{{#ifeq: 01 | 1 | same | different}}"), "same");
        assert_eq!(expand("{{#ifeq: a | b | same | different}}"), "different");
        assert_eq!(expand("{{#ifeq: &amp; | & | same}}"), "same");
        assert_eq!(expand("{{#ifexpr: 2 - 2 | yes | no}}"), "no");
        assert_eq!(expand("{{#ifexpr: 3 | yes | no}}"), "yes");
        assert_eq!(expand("{{#ifexist: Main Page | yes | no}}"), "no");
        assert_eq!(expand("{{#iferror: {{#expr: 1/0}} | bad | good}}"), "bad");
        assert_eq!(expand("{{#iferror: 5 | bad | good}}"), "good");
        assert_eq!(expand("{{#iferror: 5 | bad}}"), "5");
    }

    #[test]
    fn switch() {
        let cases = "| a = first | b = second | #default = default";
        assert_eq!(expand(&format!("{{{{#switch: b {cases}}}}}")), "second");
        assert_eq!(expand(&format!("{{{{#switch: z {cases}}}}}")), "default");
        assert_eq!(expand("{{#switch: a | a | b = ab | c}}"), "ab", "fall through");
        assert_eq!(expand("{{#switch: q | a = 1 | other}}"), "other");
        assert_eq!(expand("{{#switch: 1.0 | 1 = one}}"), "one");
        assert_eq!(expand("{{#switch: q | a = 1}}"), "");
        assert_eq!(
            expand("{{#switch: q | a = 1 | #default = D | E}}"),
            "E",
            "a bare trailing default wins over #default"
        );
        assert_eq!(expand("{{#switch: a | a = 1 | #default = D | E}}"), "1");
    }

    #[test]
    fn expressions() {
        assert_eq!(expand("{{#expr: 2 + 3 * 4}}"), "14");
        assert_eq!(expand("{{#expr: (2 + 3) * 4}}"), "20");
        assert_eq!(expand("{{#expr: 1 - 2 - 3}}"), "-4");
        assert_eq!(expand("{{#expr: }}"), "");
        assert_eq!(
            expand("{{#expr: 1/0}}"),
            r#"<strong class="error">Expression error: Division by zero.</strong>"#
        );
        assert_eq!(
            expand(&format!("{{{{#expr: {}1{} }}}}", "(".repeat(10_000), ")".repeat(10_000))),
            r#"<strong class="error">Expression error: Stack exhausted.</strong>"#
        );
    }

    #[test]
    fn escapes() {
        assert_eq!(expand("a{{!}}b{{=}}c"), "a|b=c");
    }

    #[test]
    fn string_functions() {
        assert_eq!(expand("{{#len: héllo }}"), "5");
        assert_eq!(expand("{{#pos: hello world | o}}"), "4");
        assert_eq!(expand("{{#pos: hello world | o | 5}}"), "7");
        assert_eq!(expand("{{#pos: hello | z}}"), "");
        assert_eq!(expand("{{#rpos: hello world | o}}"), "7");
        assert_eq!(expand("{{#rpos: hello | z}}"), "-1");
        assert_eq!(expand("{{#sub: Icecream | 3}}"), "cream");
        assert_eq!(expand("{{#sub: Icecream | -3}}"), "eam");
        assert_eq!(expand("{{#sub: Icecream | 0 | 3}}"), "Ice");
        assert_eq!(expand("{{#sub: Icecream | 0 | -3}}"), "Icecr");
        assert_eq!(expand("{{#replace: a-b-c | - | +}}"), "a+b+c");
        assert_eq!(expand("{{#replace: a b c}}"), "abc");
        assert_eq!(expand("{{#explode: a/b/c | / | 1}}"), "b");
        assert_eq!(expand("{{#explode: a/b/c | / | -1}}"), "c");
        assert_eq!(expand("{{#explode: a/b/c | / | 1 | 2}}"), "b/c");
        assert_eq!(expand("{{#explode: a/b/c | / | 5}}"), "");
        assert_eq!(expand("{{lc: ABC}}"), "abc");
        assert_eq!(expand("{{uc: abc}}"), "ABC");
        assert_eq!(expand("{{lcfirst: ABC}}"), "aBC");
        assert_eq!(expand("{{ucfirst: abc}}"), "Abc");
        assert_eq!(expand("{{#titleparts: A/B/C/D | 2 | 2}}"), "B/C");
        assert_eq!(expand("{{#titleparts: A/B/C | -1}}"), "A/B");
        assert_eq!(expand("{{#titleparts: A/B/C}}"), "A/B/C");
    }

    #[test]
    fn padding() {
        assert_eq!(expand("{{#pad: 7 | 3 | 0}}"), "007");
        assert_eq!(expand("{{#pad: ab | 6 | xy | center}}"), "xyabxy");
        assert_eq!(expand("{{#pad: ab | 5 | - | right}}"), "ab---");
        assert_eq!(expand("{{#pad: abc | 2 | -}}"), "abc", "never truncates");
        assert_eq!(expand("{{padleft: 7 | 3}}"), "007");
        assert_eq!(expand("{{padright: 7 | 3 | ab}}"), "7ab");
    }

    #[test]
    fn numbers() {
        assert_eq!(expand("{{formatnum: 1234567.5}}"), "1,234,567.5");
        assert_eq!(expand("{{formatnum: 1,234 | R}}"), "1234");
        assert_eq!(expand("{{plural: 1 | item | items}}"), "item");
        assert_eq!(expand("{{plural: 3 | item | items}}"), "items");
        assert_eq!(expand("{{plural: 3 | item}}"), "item");
    }

    #[test]
    fn urls_and_titles() {
        assert_eq!(expand("{{urlencode: a b&c}}"), "a+b%26c");
        assert_eq!(expand("{{urlencode: a b | WIKI}}"), "a_b");
        assert_eq!(expand("{{#urldecode: a%20b}}"), "a b");
        assert_eq!(expand("{{anchorencode: a b}}"), "a_b");
        assert_eq!(expand("{{ns: 10}}"), "Template");
        assert_eq!(expand("{{ns: user_talk}}"), "User talk");
        assert_eq!(expand("{{ns: nope}}"), "");
    }

    #[test]
    fn tags() {
        assert_eq!(
            expand(r#"{{#tag:span|hi|class = "x"}}"#),
            r#"<span class="x">hi</span>"#
        );
        assert_eq!(expand("{{#tag: br}}"), "<br/>");
        assert_eq!(expand("{{#tag:b|x|hidden}}"), r#"<b hidden="">x</b>"#);
        assert_eq!(expand("{{#invoke: Module | main | x}}"), "");
        assert_eq!(expand("{{#property: P31}}"), "");
    }

    #[test]
    fn variables() {
        assert_eq!(
            expand("{{CURRENTYEAR}}-{{CURRENTMONTH}}-{{CURRENTDAY2}}"),
            "2024-02-29"
        );
        assert_eq!(expand("{{CURRENTMONTHNAME}}"), "February");
        assert_eq!(expand("{{CURRENTMONTHABBREV}}"), "Feb");
        assert_eq!(expand("{{CURRENTDAYNAME}}"), "Thursday");
        assert_eq!(expand("{{CURRENTDOW}}"), "4");
        assert_eq!(expand("{{CURRENTTIME}}"), "13:05");
        assert_eq!(expand("{{CURRENTTIMESTAMP}}"), "20240229130509");
        assert_eq!(expand("{{CURRENTWEEK}}"), "9");
        assert_eq!(expand("{{LOCALHOUR}}"), "14");
        assert_eq!(expand("{{CURRENTHOUR}}"), "13");
    }

    #[test]
    fn time() {
        assert_eq!(expand("{{#time: H}}"), "13");
        assert_eq!(expand("{{#timel: H}}"), "14");
        assert_eq!(expand("{{#time: H | | | 1}}"), "14");
        assert_eq!(expand("{{#time: Y-m-d | 2001-07-04}}"), "2001-07-04");
        assert_eq!(expand("{{#time: j F Y | 4 July 2001}}"), "4 July 2001");
        assert_eq!(
            expand("{{#time: Y | garbage}}"),
            r#"<strong class="error">Error: Invalid time.</strong>"#
        );
    }
}
