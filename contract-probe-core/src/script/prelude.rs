//! Fixed Python sections of every generated worker

/// Imports, payload decoding and check helpers
pub const PRELUDE: &str = r##"import contextlib
import datetime
import decimal
import io
import json
import math
import sys
import types

_TYPE_KEY = "__type__"
_REPR_LIMIT = 200


def _iso(text):
    head, dot, rest = text.partition(".")
    if not dot:
        return text
    digits = ""
    index = 0
    while index < len(rest) and rest[index].isdigit():
        digits += rest[index]
        index += 1
    return head + "." + digits[:6].ljust(6, "0") + rest[index:]


def _decode(value):
    if isinstance(value, list):
        return [_decode(item) for item in value]
    if not isinstance(value, dict):
        return value
    tag = value.get(_TYPE_KEY)
    if tag is None:
        return {key: _decode(item) for key, item in value.items()}
    payload = value.get("value")
    if tag == "decimal":
        return decimal.Decimal(payload)
    if tag == "float":
        return float(payload)
    if tag == "datetime" or tag == "naive_datetime":
        return datetime.datetime.fromisoformat(_iso(payload))
    if tag == "date":
        return datetime.date.fromisoformat(payload)
    if tag == "time":
        return datetime.time.fromisoformat(_iso(payload))
    if tag == "bytes":
        return bytes.fromhex(payload)
    if tag == "tuple":
        return tuple(_decode(item) for item in payload)
    if tag == "set":
        return set(_decode(item) for item in payload)
    if tag == "map":
        return {key: _decode(item) for key, item in payload.items()}
    if tag == "object":
        return types.SimpleNamespace(**{key: _decode(item) for key, item in payload.items()})
    raise ValueError("unknown type tag %r" % (tag,))


def _repr(value):
    text = repr(value)
    if len(text) > _REPR_LIMIT:
        text = text[:_REPR_LIMIT] + "..."
    return text


def _is_empty(value):
    if value is None:
        return True
    try:
        return len(value) == 0
    except TypeError:
        return False


def _no_duplicates(value):
    items = list(value)
    try:
        return len(set(items)) == len(items)
    except TypeError:
        seen = []
        for item in items:
            if item in seen:
                return False
            seen.append(item)
        return True


def _is_sorted(value, descending=False):
    items = list(value)
    if descending:
        return all(a >= b for a, b in zip(items, items[1:]))
    return all(a <= b for a, b in zip(items, items[1:]))


def _plain(value):
    if isinstance(value, (list, tuple)):
        return [_plain(item) for item in value]
    if isinstance(value, dict):
        return {key: _plain(item) for key, item in value.items()}
    if isinstance(value, types.SimpleNamespace):
        return {key: _plain(item) for key, item in vars(value).items()}
    return value


def _equals(actual, expected):
    both_numbers = all(
        isinstance(v, (int, float)) and not isinstance(v, bool) for v in (actual, expected)
    )
    if both_numbers and (isinstance(actual, float) or isinstance(expected, float)):
        if math.isnan(actual) and math.isnan(expected):
            return True
        return math.isclose(actual, expected, rel_tol=1e-9, abs_tol=1e-12)
    return _plain(actual) == _plain(expected)


_HELPERS = {
    "_is_empty": _is_empty,
    "_no_duplicates": _no_duplicates,
    "_is_sorted": _is_sorted,
    "_equals": _equals,
    "decimal": decimal,
    "datetime": datetime,
    "math": math,
}
"##;

/// Entry point: read the payload, call the target, evaluate checks, emit one line
pub const MAIN: &str = r##"def _emit(report):
    sys.__stdout__.write(json.dumps(report, sort_keys=True, default=str) + "\n")
    sys.__stdout__.flush()


def _evaluate(name, expression, scope, label):
    namespace = dict(_HELPERS)
    namespace.update(scope)
    try:
        code = compile(expression, "<" + name + ">", "eval")
        holds = bool(eval(code, namespace))
    except Exception as exc:
        return {
            "name": name,
            "passed": False,
            "message": "error evaluating %s: %s: %s" % (expression, type(exc).__name__, exc),
        }
    if holds:
        return {"name": name, "passed": True, "message": "ok"}
    if "result" in scope:
        detail = " (result=%s)" % (_repr(scope["result"]),)
    else:
        detail = ""
    return {
        "name": name,
        "passed": False,
        "message": "%s violated: %s%s" % (label, expression, detail),
    }


def _run(report):
    try:
        payload = json.loads(sys.stdin.read() or "{}")
        inputs = _decode(payload.get("inputs", {}))
        has_expected = "expected" in payload
        expected = _decode(payload.get("expected"))
        has_observed = "observed" in payload
        observed = _decode(payload.get("observed"))
    except Exception as exc:
        report["error"] = "invalid payload: %s: %s" % (type(exc).__name__, exc)
        return
    if not isinstance(inputs, dict):
        report["error"] = "invalid payload: inputs must be a mapping"
        return

    scope = dict(inputs)
    scope["inputs"] = inputs

    for name, expression in _PRECONDITIONS:
        outcome = _evaluate(name, expression, scope, "precondition")
        report["invariants"].append(outcome)
        if not outcome["passed"]:
            return

    if has_observed:
        result = observed
    elif _target is None:
        report["error"] = "no target function embedded; supply an observed output"
        return
    else:
        sink = io.StringIO()
        try:
            with contextlib.redirect_stdout(sink):
                result = _target(**inputs)
        except BaseException as exc:
            report["error"] = "target raised %s: %s" % (type(exc).__name__, exc)
            return

    scope["result"] = result
    scope["output"] = result
    scope["expected"] = expected

    for name, expression, label, needs_expected in _CHECKS:
        if needs_expected and not has_expected:
            continue
        if needs_expected:
            if _equals(result, expected):
                outcome = {"name": name, "passed": True, "message": "ok"}
            else:
                outcome = {
                    "name": name,
                    "passed": False,
                    "message": "expected %s, got %s" % (_repr(expected), _repr(result)),
                }
        else:
            outcome = _evaluate(name, expression, scope, label)
        report["invariants"].append(outcome)


def _main():
    report = {"passed": False, "invariants": [], "error": None}
    try:
        _run(report)
    except BaseException as exc:
        report["error"] = "worker error: %s: %s" % (type(exc).__name__, exc)
    report["passed"] = report["error"] is None and all(
        item["passed"] for item in report["invariants"]
    )
    _emit(report)
"##;

/// Marker lines every valid worker must contain
pub const ENTRY_MARKERS: [&str; 2] = ["def _main(", "if __name__ == \"__main__\":"];

pub const ENTRY_POINT: &str = "if __name__ == \"__main__\":\n    _main()\n";
