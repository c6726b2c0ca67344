/// String manipulation utilities (hex codecs, signed reinterpretation).
pub mod strings;
