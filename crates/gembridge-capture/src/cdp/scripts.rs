//! JavaScript snippets evaluated inside the chat page.
//!
//! Elements are addressed by a `data-gembridge-ref` attribute stamped on them
//! by [`query_all`]. Arguments are embedded as JSON literals, never spliced
//! as raw text.

const REF_ATTR: &str = "data-gembridge-ref";

fn lit(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

/// Resolve a ref or throw, so a detached node surfaces as an exception.
fn lookup(id: &str) -> String {
    format!(
        "const el = document.querySelector('[{attr}=' + JSON.stringify({id}) + ']'); \
         if (!el) throw new Error('element ' + {id} + ' detached');",
        attr = REF_ATTR,
        id = lit(id)
    )
}

pub fn query_all(selector: &str) -> String {
    format!(
        "(() => {{ \
           window.__gembridgeSeq = window.__gembridgeSeq || 0; \
           const out = []; \
           for (const el of document.querySelectorAll({sel})) {{ \
             let id = el.getAttribute('{attr}'); \
             if (!id) {{ id = String(++window.__gembridgeSeq); el.setAttribute('{attr}', id); }} \
             out.push(id); \
           }} \
           return out; \
         }})()",
        sel = lit(selector),
        attr = REF_ATTR
    )
}

pub fn element_info(id: &str) -> String {
    format!(
        "(() => {{ {lookup} \
           const style = window.getComputedStyle(el); \
           const rect = el.getBoundingClientRect(); \
           return {{ \
             tag: el.tagName.toLowerCase(), \
             visible: style.display !== 'none' && style.visibility !== 'hidden' && (rect.width > 0 || rect.height > 0), \
             enabled: !el.disabled && el.getAttribute('aria-disabled') !== 'true', \
             clientHeight: el.clientHeight, \
             hasVectorIcon: !!el.querySelector('svg, mat-icon, .material-icons, .material-symbols-outlined'), \
             ariaLabel: el.getAttribute('aria-label') \
           }}; \
         }})()",
        lookup = lookup(id)
    )
}

pub fn element_text(id: &str) -> String {
    format!(
        "(() => {{ {lookup} \
           return ('value' in el && (el.tagName === 'TEXTAREA' || el.tagName === 'INPUT')) \
             ? el.value : (el.innerText || el.textContent || ''); \
         }})()",
        lookup = lookup(id)
    )
}

/// Outermost `pre`/`code` blocks only; `pre > code` counts once.
pub fn code_block_texts(id: &str) -> String {
    format!(
        "(() => {{ {lookup} \
           return Array.from(el.querySelectorAll('pre, code')) \
             .filter(n => {{ const outer = n.parentElement && n.parentElement.closest('pre, code'); return !outer || !el.contains(outer); }}) \
             .map(n => n.innerText || n.textContent || ''); \
         }})()",
        lookup = lookup(id)
    )
}

pub fn body_text() -> String {
    "document.body ? document.body.innerText : ''".to_string()
}

pub fn focus(id: &str) -> String {
    format!("(() => {{ {lookup} el.focus(); return true; }})()", lookup = lookup(id))
}

/// Rich-text editors take `insertText`; plain fields need the native setter.
pub fn insert_text(id: &str, text: &str) -> String {
    format!(
        "(() => {{ {lookup} \
           const text = {text}; \
           el.focus(); \
           if (el.tagName === 'TEXTAREA' || el.tagName === 'INPUT') {{ \
             const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
             Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, text); \
           }} else {{ \
             document.execCommand('selectAll', false, null); \
             if (!document.execCommand('insertText', false, text)) el.textContent = text; \
           }} \
           return true; \
         }})()",
        lookup = lookup(id),
        text = lit(text)
    )
}

pub fn dispatch_input_events(id: &str) -> String {
    format!(
        "(() => {{ {lookup} \
           el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
           el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
           return true; \
         }})()",
        lookup = lookup(id)
    )
}

pub fn pointer_click(id: &str) -> String {
    format!(
        "(() => {{ {lookup} \
           const opts = {{ bubbles: true, cancelable: true, view: window }}; \
           el.dispatchEvent(new PointerEvent('pointerdown', opts)); \
           el.dispatchEvent(new PointerEvent('pointerup', opts)); \
           el.click(); \
           return true; \
         }})()",
        lookup = lookup(id)
    )
}

pub fn press_enter(id: &str) -> String {
    format!(
        "(() => {{ {lookup} \
           const opts = {{ key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true, cancelable: true }}; \
           for (const type of ['keydown', 'keypress', 'keyup']) el.dispatchEvent(new KeyboardEvent(type, opts)); \
           return true; \
         }})()",
        lookup = lookup(id)
    )
}
