/// An entry in the stable error-code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    pub short: &'static str,
    pub long: &'static str,
}

pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code.eq_ignore_ascii_case(code))
}

/// All stable error codes, grouped by the stage that raises them.
/// `tarn explain <code>` prints the long text.
pub static REGISTRY: &[ErrorEntry] = &[
    // ---- Lexer ----
    ErrorEntry {
        code: "TARN-L001",
        short: "unexpected character",
        long: "A character was encountered that is not part of the language.\n\
               \n\
                   let x = 5 @\n\
               \n\
               Remove the character or replace it with a valid operator.\n",
    },
    ErrorEntry {
        code: "TARN-L002",
        short: "unterminated string literal",
        long: "A string literal was opened but never closed before the end\n\
               of the line or file.\n\
               \n\
                   let s = \"hello\n\
               \n\
               Add the closing double quote.\n",
    },
    // ---- Parser ----
    ErrorEntry {
        code: "TARN-P001",
        short: "token cannot appear here",
        long: "The parser found a token that cannot start or continue an\n\
               expression, such as a lone infix operator:\n\
               \n\
                   + 3;\n\
               \n\
               Infix operators need an expression on both sides.\n",
    },
    ErrorEntry {
        code: "TARN-P002",
        short: "expected a different token",
        long: "A construct is incomplete: something required by the grammar\n\
               is missing, for example the name in a let statement:\n\
               \n\
                   let = 5;\n",
    },
    // ---- Compiler ----
    ErrorEntry {
        code: "TARN-C001",
        short: "undefined variable",
        long: "A name was used that no `let` binding, parameter, or builtin\n\
               defines at that point in the program. Bindings must appear\n\
               before use:\n\
               \n\
                   let x = 5; x + y;   // y is undefined\n",
    },
    // ---- Runtime ----
    ErrorEntry {
        code: "TARN-R001",
        short: "operand types do not fit the operator",
        long: "A binary operator was applied to a pair of values it does not\n\
               support, such as `5 + true`. Arithmetic needs two integers;\n\
               `+` also concatenates two strings.\n",
    },
    ErrorEntry {
        code: "TARN-R002",
        short: "unknown operator for these types",
        long: "The operand types match but the operator is not defined for\n\
               them, such as `\"a\" - \"b\"` or `true > false`.\n",
    },
    ErrorEntry {
        code: "TARN-R003",
        short: "operand cannot be negated",
        long: "Unary minus only applies to integers. `-true` is an error.\n",
    },
    ErrorEntry {
        code: "TARN-R004",
        short: "division by zero",
        long: "The right-hand side of `/` evaluated to 0.\n",
    },
    ErrorEntry {
        code: "TARN-R005",
        short: "value is not callable",
        long: "Something other than a function or builtin was called, such\n\
               as `1(2)`. Only closures and builtins may be called.\n",
    },
    ErrorEntry {
        code: "TARN-R006",
        short: "wrong number of arguments",
        long: "A function was called with a different number of arguments\n\
               than it declares parameters. Calls are checked exactly; there\n\
               are no optional parameters.\n",
    },
    ErrorEntry {
        code: "TARN-R007",
        short: "value cannot be a hash key",
        long: "Only integers, booleans, and strings can key a hash. Arrays,\n\
               hashes, and functions cannot:\n\
               \n\
                   {[1, 2]: \"nope\"}\n",
    },
    ErrorEntry {
        code: "TARN-R008",
        short: "value cannot be indexed",
        long: "The index operator works on arrays (with an integer) and\n\
               hashes (with a hashable key). Anything else is an error,\n\
               such as `\"abc\"[0]`.\n",
    },
    ErrorEntry {
        code: "TARN-R009",
        short: "stack overflow",
        long: "The value stack or the call-frame stack ran out of room,\n\
               usually because of unbounded recursion.\n",
    },
    ErrorEntry {
        code: "TARN-R010",
        short: "unknown opcode",
        long: "The virtual machine hit a byte that is not a defined opcode.\n\
               This indicates corrupted bytecode and is always a bug.\n",
    },
    ErrorEntry {
        code: "TARN-R011",
        short: "closure over a non-function constant",
        long: "An OpClosure instruction referenced a constant that is not a\n\
               compiled function. This indicates corrupted bytecode and is\n\
               always a bug.\n",
    },
    ErrorEntry {
        code: "TARN-R012",
        short: "identifier not found",
        long: "The tree-walking engine resolved names at run time and found\n\
               no binding for one. The compiled path reports the same\n\
               problem before execution as TARN-C001.\n",
    },
];
