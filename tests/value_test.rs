mod common;

use bytes::Bytes;
use jsengine_v8::Error;

#[test]
fn test_type_predicates() {
    let engine = common::new_engine();
    let eval = |code: &str| engine.evaluate(code, None).unwrap();

    assert!(eval("undefined").is_undefined());
    assert!(eval("null").is_null());
    assert!(!eval("null").is_undefined());

    assert!(eval("'text'").is_string());
    assert!(eval("new String('boxed')").is_string());

    assert!(eval("3.5").is_number());
    assert!(eval("new Number(1)").is_number());
    assert!(!eval("'3'").is_number());

    assert!(eval("false").is_bool());
    assert!(eval("new Boolean(true)").is_bool());

    assert!(eval("({})").is_object());
    assert!(eval("[]").is_object());
    assert!(eval("[]").is_array());
    assert!(!eval("({ length: 0 })").is_array());

    assert!(eval("(function () {})").is_function());
    assert!(eval("(() => 1)").is_function());
    assert!(!eval("({})").is_function());
}

#[test]
fn test_coercions() {
    let engine = common::new_engine();
    let eval = |code: &str| engine.evaluate(code, None).unwrap();

    assert_eq!(eval("12").as_string(), "12");
    assert_eq!(eval("({})").as_string(), "[object Object]");
    assert_eq!(eval("[1, 2]").as_string(), "1,2");
    assert_eq!(eval("undefined").as_string(), "undefined");

    assert_eq!(eval("3.9").as_int(), 3);
    assert_eq!(eval("-3.9").as_int(), -3);
    assert_eq!(eval("'17'").as_int(), 17);
    assert_eq!(eval("NaN").as_int(), 0);
    assert_eq!(eval("'not a number'").as_int(), 0);

    assert!(eval("1").as_bool());
    assert!(eval("'x'").as_bool());
    assert!(!eval("0").as_bool());
    assert!(!eval("''").as_bool());
    assert!(eval("({})").as_bool());
}

#[test]
fn test_as_string_of_throwing_conversion() {
    let engine = common::new_engine();

    let symbol = engine.evaluate("Symbol('s')", None).unwrap();
    assert_eq!(symbol.as_string(), "");

    let hostile = engine
        .evaluate("({ toString() { throw new Error('nope'); } })", None)
        .unwrap();
    assert_eq!(hostile.as_string(), "");

    // The swallowed exception does not leak into later evaluations
    assert_eq!(engine.evaluate("'ok'", None).unwrap().as_string(), "ok");
}

#[test]
fn test_as_list() {
    let engine = common::new_engine();

    let list = engine
        .evaluate("[1, 'two', , null]", None)
        .unwrap()
        .as_list()
        .unwrap();

    assert_eq!(list.len(), 4);
    assert_eq!(list[0].as_int(), 1);
    assert_eq!(list[1].as_string(), "two");
    assert!(list[2].is_undefined());
    assert!(list[3].is_null());

    let empty = engine.evaluate("[]", None).unwrap().as_list().unwrap();
    assert!(empty.is_empty());
}

#[test]
fn test_as_list_of_non_array() {
    let engine = common::new_engine();

    let err = engine
        .evaluate("({ 0: 'a', length: 1 })", None)
        .unwrap()
        .as_list()
        .unwrap_err();

    assert!(matches!(err, Error::Type(_)));
}

#[test]
fn test_as_bytes() {
    let engine = common::new_engine();
    let bytes = |code: &str| engine.evaluate(code, None).unwrap().as_bytes();

    assert_eq!(bytes("new Uint8Array([1, 2, 3])").unwrap(), Bytes::from_static(&[1, 2, 3]));
    assert_eq!(bytes("new Uint8Array([4, 5]).buffer").unwrap(), Bytes::from_static(&[4, 5]));
    assert_eq!(
        bytes("new Uint8Array([1, 2, 3, 4]).subarray(1, 3)").unwrap(),
        Bytes::from_static(&[2, 3])
    );
    assert_eq!(
        bytes("new Uint16Array([0x0201])").unwrap(),
        Bytes::from_static(&[1, 2])
    );
    assert!(bytes("new ArrayBuffer(0)").unwrap().is_empty());

    assert!(matches!(bytes("'text'"), Err(Error::Type(_))));
    assert!(matches!(bytes("[1, 2]"), Err(Error::Type(_))));
}

#[test]
fn test_bytes_become_uint8_array() {
    let engine = common::new_engine();

    let value = engine.new_value(vec![9u8, 8, 7]).unwrap();
    assert_eq!(value.class_name().unwrap(), "Uint8Array");
    assert_eq!(value.as_bytes().unwrap(), Bytes::from_static(&[9, 8, 7]));

    engine.set_global_property("data", value).unwrap();
    assert_eq!(engine.evaluate("data[0] + data[2]", None).unwrap().as_int(), 16);

    let empty = engine.new_value(Bytes::new()).unwrap();
    assert!(empty.as_bytes().unwrap().is_empty());
}

#[test]
fn test_properties() {
    let engine = common::new_engine();

    let object = engine.evaluate("({ a: 1, b: 'two' })", None).unwrap();
    assert_eq!(object.own_property_names().unwrap(), vec!["a", "b"]);
    assert_eq!(object.get_property("a").unwrap().as_int(), 1);
    assert!(object.get_property("missing").unwrap().is_undefined());

    object.set_property("c", 3.5).unwrap();
    object.set_property("d", "four").unwrap();
    object.set_property("e", &object).unwrap();

    assert_eq!(object.own_property_names().unwrap(), vec!["a", "b", "c", "d", "e"]);
    assert!(object.get_property("e").unwrap().is_same(&object));

    let number = engine.new_value(1).unwrap();
    assert!(matches!(number.own_property_names(), Err(Error::Type(_))));
    assert!(matches!(number.get_property("x"), Err(Error::Type(_))));
    assert!(matches!(number.set_property("x", 1), Err(Error::Type(_))));
}

#[test]
fn test_property_getter_exception() {
    let engine = common::new_engine();

    let object = engine
        .evaluate("({ get broken() { throw new Error('getter'); } })", None)
        .unwrap();

    match object.get_property("broken") {
        Err(Error::Script(e)) => assert_eq!(e.message, "Error: getter"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_class_name() {
    let engine = common::new_engine();
    let class = |code: &str| engine.evaluate(code, None).unwrap().class_name();

    assert_eq!(class("({})").unwrap(), "Object");
    assert_eq!(class("[]").unwrap(), "Array");
    assert_eq!(class("new Uint8Array(2)").unwrap(), "Uint8Array");
    assert_eq!(class("new (class Widget {})()").unwrap(), "Widget");
    assert!(matches!(class("42"), Err(Error::Type(_))));
}

#[test]
fn test_call() {
    let engine = common::new_engine();

    let add = engine
        .evaluate("(function (a, b) { return a + b; })", None)
        .unwrap();
    let args = [engine.new_value(2).unwrap(), engine.new_value(3).unwrap()];
    assert_eq!(add.call(&args).unwrap().as_int(), 5);

    // Missing arguments are undefined
    let arity = engine.evaluate("(function (a) { return typeof a; })", None).unwrap();
    assert_eq!(arity.call(&[]).unwrap().as_string(), "undefined");

    // Plain call receives the global object
    let receiver = engine
        .evaluate("(function () { return this === globalThis; })", None)
        .unwrap();
    assert!(receiver.call(&[]).unwrap().as_bool());
}

#[test]
fn test_call_with_this() {
    let engine = common::new_engine();

    let getter = engine
        .evaluate("(function (suffix) { return this.name + suffix; })", None)
        .unwrap();
    let this = engine.evaluate("({ name: 'widget' })", None).unwrap();

    let result = getter
        .call_with_this(&[engine.new_value("!").unwrap()], &this)
        .unwrap();
    assert_eq!(result.as_string(), "widget!");
}

#[test]
fn test_call_errors() {
    let engine = common::new_engine();

    let object = engine.new_object();
    assert!(matches!(object.call(&[]), Err(Error::Type(_))));

    let function = engine.evaluate("(function () { return 1; })", None).unwrap();
    let number = engine.new_value(5).unwrap();
    assert!(matches!(
        function.call_with_this(&[], &number),
        Err(Error::Type(_))
    ));

    let thrower = engine
        .evaluate("(function () { throw new RangeError('nope'); })", None)
        .unwrap();
    match thrower.call(&[]) {
        Err(Error::Script(e)) => assert_eq!(e.message, "RangeError: nope"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_values_are_bound_to_their_engine() {
    let engine = common::new_engine();
    let other = common::new_engine();

    let foreign = other.new_value("elsewhere").unwrap();
    assert!(matches!(engine.new_value(&foreign), Err(Error::Argument(_))));

    let function = engine.evaluate("(function (x) { return x; })", None).unwrap();
    assert!(matches!(function.call(&[foreign]), Err(Error::Argument(_))));
}

#[test]
fn test_is_same() {
    let engine = common::new_engine();
    let other = common::new_engine();

    engine.evaluate("var shared = {};", None).unwrap();
    let first = engine.evaluate("shared", None).unwrap();
    let second = engine.evaluate("shared", None).unwrap();
    let fresh = engine.evaluate("({})", None).unwrap();

    assert!(first.is_same(&second));
    assert!(first.is_same(&first.clone()));
    assert!(!first.is_same(&fresh));

    let number = engine.new_value(1).unwrap();
    let also_one = engine.evaluate("1", None).unwrap();
    assert!(number.is_same(&also_one));

    let foreign_one = other.evaluate("1", None).unwrap();
    assert!(!number.is_same(&foreign_one));
}

#[test]
fn test_value_keeps_engine_alive() {
    let engine = common::new_engine();
    let value = engine.evaluate("({ alive: true })", None).unwrap();

    let weak = std::sync::Arc::downgrade(&engine);
    drop(engine);

    assert!(weak.upgrade().is_some());
    assert!(value.get_property("alive").unwrap().as_bool());
    assert!(std::sync::Arc::ptr_eq(value.engine(), &weak.upgrade().unwrap()));

    drop(value);
    assert!(weak.upgrade().is_none());
}
