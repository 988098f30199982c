pub mod core;
pub mod providers;
pub mod utils;

pub use core::*;
pub use providers::*;
pub use utils::*;

#[macro_export]
macro_rules! prompt {
    // Pattern: "literal" {inline_value} [embedded_deferred] ...
    //
    // String literals become prompt text, `{expr}` interpolates the value's
    // Display form immediately, `[expr]` embeds another deferred generation
    // as a dependency and leaves a `${dep_<i>}` placeholder behind.
    ( $($part:tt)* ) => {{
        let mut __parts: ::std::vec::Vec<$crate::TemplatePart> = ::std::vec::Vec::new();
        $crate::__prompt_parts!(__parts; $($part)*);
        $crate::Template::from_parts(__parts)
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __prompt_parts {
    ( $parts:ident; ) => {};
    ( $parts:ident; $text:literal $($rest:tt)* ) => {
        $parts.push($crate::TemplatePart::Text(::std::string::ToString::to_string(
            &$text,
        )));
        $crate::__prompt_parts!($parts; $($rest)*);
    };
    ( $parts:ident; { $value:expr } $($rest:tt)* ) => {
        $parts.push($crate::TemplatePart::Value(::std::string::ToString::to_string(
            &$value,
        )));
        $crate::__prompt_parts!($parts; $($rest)*);
    };
    ( $parts:ident; [ $dep:expr ] $($rest:tt)* ) => {
        $parts.push($crate::TemplatePart::Dep(::std::clone::Clone::clone(&$dep)));
        $crate::__prompt_parts!($parts; $($rest)*);
    };
}
